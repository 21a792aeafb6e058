#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Absent,
    Ready,
    Destroyed,
}

/// Action the owner must take after a surface event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    AutoStart,
    Stop,
}

/// Tracks the drawing surface and decides when playback follows it.
#[derive(Debug)]
pub struct SurfaceLifecycle {
    state: SurfaceState,
    auto_start: bool,
    start_pending: bool,
    size: (u32, u32),
}

impl SurfaceLifecycle {
    pub fn new(auto_start: bool) -> Self {
        Self {
            state: SurfaceState::Absent,
            auto_start,
            start_pending: false,
            size: (0, 0),
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    /// Last geometry reported through [`Self::on_changed`].
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn on_created(&mut self) -> Transition {
        if self.state != SurfaceState::Absent {
            tracing::warn!(event = "surface_created_ignored", state = ?self.state, "Surface created twice");
            return Transition::None;
        }
        self.state = SurfaceState::Ready;
        let pending = std::mem::take(&mut self.start_pending);
        tracing::info!(
            event = "surface_created",
            auto_start = self.auto_start,
            start_pending = pending,
            "Surface created"
        );

        if self.auto_start || pending {
            Transition::AutoStart
        } else {
            Transition::None
        }
    }

    pub fn on_changed(&mut self, width: u32, height: u32) -> Transition {
        if self.state != SurfaceState::Ready {
            tracing::warn!(event = "surface_changed_ignored", state = ?self.state, "Surface not ready");
            return Transition::None;
        }
        self.size = (width, height);
        tracing::info!(event = "surface_changed", width, height, "Surface changed");
        Transition::None
    }

    /// The host asked for playback. Before the surface exists the request is
    /// held and honoured by [`Self::on_created`].
    pub fn on_start_requested(&mut self) -> Transition {
        match self.state {
            SurfaceState::Ready => Transition::AutoStart,
            SurfaceState::Absent => {
                self.start_pending = true;
                tracing::debug!(event = "start_deferred", "No surface yet, start deferred");
                Transition::None
            }
            SurfaceState::Destroyed => Transition::None,
        }
    }

    pub fn is_start_pending(&self) -> bool {
        self.start_pending
    }

    /// Terminal from any state.
    pub fn on_destroyed(&mut self) -> Transition {
        if self.state == SurfaceState::Destroyed {
            tracing::warn!(event = "surface_destroyed_ignored", "Surface already destroyed");
            return Transition::None;
        }
        tracing::info!(event = "surface_destroyed", from = ?self.state, "Surface destroyed");
        self.state = SurfaceState::Destroyed;
        self.start_pending = false;
        Transition::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_start_fires_on_creation() {
        let mut lifecycle = SurfaceLifecycle::new(true);
        assert_eq!(lifecycle.on_created(), Transition::AutoStart);
        assert!(lifecycle.is_ready());
    }

    #[test]
    fn creation_without_auto_start_does_nothing() {
        let mut lifecycle = SurfaceLifecycle::new(false);
        assert_eq!(lifecycle.on_created(), Transition::None);
        assert_eq!(lifecycle.state(), SurfaceState::Ready);
    }

    #[test]
    fn geometry_change_only_records_size() {
        let mut lifecycle = SurfaceLifecycle::new(false);
        lifecycle.on_created();
        assert_eq!(lifecycle.on_changed(640, 480), Transition::None);
        assert_eq!(lifecycle.size(), (640, 480));
    }

    #[test]
    fn destroy_always_stops_and_is_terminal() {
        let mut lifecycle = SurfaceLifecycle::new(false);
        lifecycle.on_created();
        assert_eq!(lifecycle.on_destroyed(), Transition::Stop);
        assert_eq!(lifecycle.state(), SurfaceState::Destroyed);

        assert_eq!(lifecycle.on_created(), Transition::None);
        assert_eq!(lifecycle.on_destroyed(), Transition::None);
        assert_eq!(lifecycle.state(), SurfaceState::Destroyed);
    }

    #[test]
    fn geometry_before_creation_is_ignored() {
        let mut lifecycle = SurfaceLifecycle::new(true);
        assert_eq!(lifecycle.on_changed(1, 1), Transition::None);
        assert_eq!(lifecycle.size(), (0, 0));
        assert_eq!(lifecycle.state(), SurfaceState::Absent);
    }

    #[test]
    fn destroy_before_creation_is_terminal() {
        let mut lifecycle = SurfaceLifecycle::new(true);
        assert_eq!(lifecycle.on_destroyed(), Transition::Stop);
        assert_eq!(lifecycle.state(), SurfaceState::Destroyed);
        assert_eq!(lifecycle.on_created(), Transition::None);
    }

    #[test]
    fn early_start_waits_for_creation() {
        let mut lifecycle = SurfaceLifecycle::new(false);
        assert_eq!(lifecycle.on_start_requested(), Transition::None);
        assert!(lifecycle.is_start_pending());

        assert_eq!(lifecycle.on_created(), Transition::AutoStart);
        assert!(!lifecycle.is_start_pending());
        assert_eq!(lifecycle.on_start_requested(), Transition::AutoStart);
    }

    #[test]
    fn destroy_drops_pending_start() {
        let mut lifecycle = SurfaceLifecycle::new(false);
        lifecycle.on_start_requested();
        lifecycle.on_destroyed();
        assert!(!lifecycle.is_start_pending());
        assert_eq!(lifecycle.on_start_requested(), Transition::None);
    }
}
