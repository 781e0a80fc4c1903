//! Tile refresh bookkeeping.
//!
//! [`TileState`] tracks where a tile is in its refresh cycle and which of its
//! source buffers still have to reach the composite. [`RenderParams`] keeps
//! the settings the tile's image was last produced with and decides what a
//! settings change invalidates.

use crate::settings::MapSettings;

/// Refresh cycle of one tile.
///
/// ```text
/// Clean --begin_refresh--> Refreshing --settle--> {Refreshing, BaseDirty,
///                                                  OverlayDirty, BothDirty}
///       <------------------recomposited------------------------------'
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileState {
    /// Composite matches base and overlay, no job in flight
    #[default]
    Clean,
    /// A refresh job is sweeping the tile
    Refreshing,
    /// The sweep changed the base image
    BaseDirty,
    /// The sweep changed the overlay
    OverlayDirty,
    /// The sweep changed both
    BothDirty,
}

impl TileState {
    /// Starts a refresh. Only a clean tile can start one.
    #[must_use]
    pub const fn begin_refresh(self) -> Option<Self> {
        match self {
            Self::Clean => Some(Self::Refreshing),
            _ => None,
        }
    }

    /// Records what the sweep changed. Dirtiness already recorded is kept.
    #[must_use]
    pub const fn settle(self, base_dirty: bool, overlay_dirty: bool) -> Self {
        let base = base_dirty || matches!(self, Self::BaseDirty | Self::BothDirty);
        let overlay = overlay_dirty || matches!(self, Self::OverlayDirty | Self::BothDirty);
        match (base, overlay) {
            (true, true) => Self::BothDirty,
            (true, false) => Self::BaseDirty,
            (false, true) => Self::OverlayDirty,
            (false, false) => match self {
                Self::Clean => Self::Clean,
                _ => Self::Refreshing,
            },
        }
    }

    /// The composite caught up with base and overlay.
    #[must_use]
    pub const fn recomposited(self) -> Self {
        Self::Clean
    }

    /// Whether a refresh is in progress. Refresh requests are dropped
    /// while busy.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Clean)
    }

    /// Whether the composite is stale.
    #[must_use]
    pub const fn needs_recomposite(self) -> bool {
        matches!(self, Self::BaseDirty | Self::OverlayDirty | Self::BothDirty)
    }

    /// Whether the base image has to be written to disk.
    #[must_use]
    pub const fn persists_base(self) -> bool {
        matches!(self, Self::BaseDirty | Self::BothDirty)
    }
}

/// The settings values a tile image depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Applied {
    hide_water: bool,
    water_tint: bool,
    alternate_color_mode: bool,
    show_grid: bool,
    show_loaded_overlay: bool,
    show_feature_overlay: bool,
}

impl Applied {
    const fn from_settings(settings: &MapSettings) -> Self {
        Self {
            hide_water: settings.hide_water,
            water_tint: settings.effective_water_tint(),
            alternate_color_mode: settings.alternate_color_mode,
            show_grid: settings.show_grid,
            show_loaded_overlay: settings.show_loaded_overlay,
            show_feature_overlay: settings.show_feature_overlay,
        }
    }
}

/// Last applied settings of a tile and the refresh work they imply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderParams {
    applied: Applied,
    /// Resample every group, ignoring cached colors
    pub needs_full_refresh: bool,
    /// Recompute every overlay cell
    pub overlay_needs_refresh: bool,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self::new(&MapSettings::default())
    }
}

impl RenderParams {
    /// Params of an image produced with `settings`.
    #[must_use]
    pub const fn new(settings: &MapSettings) -> Self {
        Self {
            applied: Applied::from_settings(settings),
            needs_full_refresh: false,
            overlay_needs_refresh: false,
        }
    }

    /// Diffs `settings` against the applied values, adopts them and raises
    /// the refresh flags the differences call for. Flags are only ever
    /// raised here.
    pub fn observe(&mut self, settings: &MapSettings) {
        let next = Applied::from_settings(settings);
        let prev = self.applied;

        if settings.force_update
            || next.hide_water != prev.hide_water
            || next.water_tint != prev.water_tint
            || next.alternate_color_mode != prev.alternate_color_mode
        {
            self.needs_full_refresh = true;
        }
        if next.show_grid != prev.show_grid
            || next.show_loaded_overlay != prev.show_loaded_overlay
            || next.show_feature_overlay != prev.show_feature_overlay
        {
            self.overlay_needs_refresh = true;
        }
        self.applied = next;
    }

    /// Drops both flags after a finished refresh.
    pub fn clear_flags(&mut self) {
        self.needs_full_refresh = false;
        self.overlay_needs_refresh = false;
    }

    /// Grid overlay as last applied.
    #[must_use]
    pub const fn show_grid(&self) -> bool {
        self.applied.show_grid
    }

    /// Loaded-group overlay as last applied.
    #[must_use]
    pub const fn show_loaded_overlay(&self) -> bool {
        self.applied.show_loaded_overlay
    }

    /// Feature overlay as last applied.
    #[must_use]
    pub const fn show_feature_overlay(&self) -> bool {
        self.applied.show_feature_overlay
    }

    /// Whether overlay cells have to be recomputed on this sweep. The loaded
    /// and feature overlays follow live provider flags, so they are redrawn
    /// on every sweep while enabled.
    #[must_use]
    pub const fn overlay_pass(&self) -> bool {
        self.overlay_needs_refresh || self.applied.show_loaded_overlay || self.applied.show_feature_overlay
    }
}
