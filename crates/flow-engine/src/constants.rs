//! Constant values shared across the engine

/// Default values used by the configuration types
pub mod defaults {
    /// Width assigned to a freshly placed node
    pub const NODE_WIDTH: f64 = 200.0;
    /// Height assigned to a freshly placed node
    pub const NODE_HEIGHT: f64 = 100.0;

    /// Upper bound on executors in flight for one run (0 = unbounded)
    pub const MAX_CONCURRENT_NODES: usize = 0;

    /// Space between the enclosed nodes and a group's border
    pub const GROUP_PADDING: f64 = 20.0;
    /// Extra room above the enclosed nodes for the draggable title bar
    pub const GROUP_TITLE_HEIGHT: f64 = 32.0;
    /// Smallest width a group can be resized to
    pub const GROUP_MIN_WIDTH: f64 = 150.0;
    /// Smallest height a group can be resized to
    pub const GROUP_MIN_HEIGHT: f64 = 80.0;
    /// Height drawn and hit-tested for a collapsed group
    pub const GROUP_COLLAPSED_HEIGHT: f64 = 40.0;
    /// Per-axis reach of a resize handle's hit area around its anchor
    pub const GROUP_HANDLE_RADIUS: f64 = 8.0;

    /// Rectangle used when a group is created without any nodes
    pub const GROUP_DEFAULT_X: f64 = 0.0;
    pub const GROUP_DEFAULT_Y: f64 = 0.0;
    pub const GROUP_DEFAULT_WIDTH: f64 = 300.0;
    pub const GROUP_DEFAULT_HEIGHT: f64 = 200.0;

    /// Color given to new groups
    pub const GROUP_COLOR: &str = "#4a5568";
}
