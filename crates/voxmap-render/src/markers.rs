//! Entity and player markers.
//!
//! Markers are resolved once per frame against the view's
//! [`ScreenMapping`]: radar toggles, icon size, color, clipping and map
//! rotation are decided here, and the host draws the resulting
//! [`ResolvedMarker`]s however it likes.

use crate::color::{DARK_RED, GREEN, LIGHT_GRAY, YELLOW};
use crate::display::TextureHandle;
use crate::settings::MapSettings;
use crate::window::ScreenMapping;

/// Icon size when heads are not shown.
pub const DOT_ICON_SIZE: i32 = 4;

/// A mob or animal.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMarker {
    /// World x
    pub x: f64,
    /// World z
    pub z: f64,
    /// Counts for the hostile radar
    pub hostile: bool,
    /// Can be tamed
    pub tameable: bool,
    /// Has been tamed
    pub tamed: bool,
    /// Head texture, if the host has one
    pub head: Option<TextureHandle>,
}

/// Another player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMarker {
    /// World x
    pub x: f64,
    /// World z
    pub z: f64,
    /// Display name
    pub name: String,
    /// Skin head texture, if loaded
    pub head: Option<TextureHandle>,
}

/// Anything shown as an icon on the map.
#[derive(Debug, Clone, PartialEq)]
pub enum MapMarker {
    /// Mob or animal
    Entity(EntityMarker),
    /// Player
    Player(PlayerMarker),
}

/// Screen area markers are drawn in.
#[derive(Debug, Clone, Copy)]
pub struct MarkerContext<'a> {
    /// Settings of this frame
    pub settings: &'a MapSettings,
    /// Screen position of the map area's top-left corner
    pub origin: (f64, f64),
    /// Map area size
    pub size: (f64, f64),
    /// Player heading in degrees, applied when the map rotates
    pub rotation: f64,
}

/// What to draw for a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerIcon {
    /// Textured head
    Head(TextureHandle),
    /// Outlined circle of the marker color
    Dot {
        /// Circle radius
        radius: f64,
    },
}

/// Frame of a player icon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    /// Thickness in pixels
    pub thickness: f64,
    /// ARGB color
    pub color: i32,
}

/// A marker placed on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMarker {
    /// Left edge of the icon
    pub x: f64,
    /// Top edge of the icon
    pub y: f64,
    /// Icon size in pixels
    pub size: i32,
    /// ARGB color
    pub color: i32,
    /// Icon
    pub icon: MarkerIcon,
    /// Frame drawn under the icon
    pub outline: Option<Outline>,
    /// Text shown with the icon
    pub label: Option<String>,
}

fn icon(head: Option<TextureHandle>, heads: bool, size: i32) -> MarkerIcon {
    match head {
        Some(texture) if heads => MarkerIcon::Head(texture),
        _ => MarkerIcon::Dot {
            radius: f64::from(size / 3),
        },
    }
}

impl MapMarker {
    /// World position.
    #[must_use]
    pub fn world_pos(&self) -> (f64, f64) {
        match self {
            Self::Entity(e) => (e.x, e.z),
            Self::Player(p) => (p.x, p.z),
        }
    }

    /// Places the marker on screen. `None` when the radar for its kind is
    /// off or it falls outside the map area.
    #[must_use]
    pub fn resolve(&self, mapping: &ScreenMapping, ctx: &MarkerContext<'_>) -> Option<ResolvedMarker> {
        let settings = ctx.settings;
        let (size, color, icon, outline, label) = match self {
            Self::Entity(e) => {
                if (e.hostile && !settings.hostile_radar) || (!e.hostile && !settings.creature_radar) {
                    return None;
                }
                let size = if settings.show_entity_heads {
                    settings.entity_icon_size
                } else {
                    DOT_ICON_SIZE
                };
                let color = if e.tameable {
                    if e.tamed {
                        GREEN
                    } else {
                        YELLOW
                    }
                } else if e.hostile {
                    DARK_RED
                } else {
                    YELLOW
                };
                (size, color, icon(e.head, settings.show_entity_heads, size), None, None)
            },
            Self::Player(p) => {
                let size = settings.entity_icon_size;
                let outline = settings.show_icons_outline.then_some(Outline {
                    thickness: settings.entity_outline_size,
                    color: LIGHT_GRAY,
                });
                (size, LIGHT_GRAY, icon(p.head, true, size), outline, Some(p.name.clone()))
            },
        };

        let (wx, wz) = self.world_pos();
        let (sx, sy) = mapping.world_to_screen(wx, wz);
        let half = f64::from(size / 2);
        let mut x = ctx.origin.0 + sx - half;
        let mut y = ctx.origin.1 + sy - half;

        let s = f64::from(size);
        let inside_x = x >= ctx.origin.0 && x <= ctx.origin.0 + ctx.size.0 - s;
        let inside_y = y >= ctx.origin.1 && y <= ctx.origin.1 + ctx.size.1 - s;
        if !inside_x || !inside_y {
            return None;
        }

        if settings.rotate_map {
            (x, y) = rotate_about(
                (x, y),
                (ctx.origin.0 + ctx.size.0 / 2.0, ctx.origin.1 + ctx.size.1 / 2.0),
                -ctx.rotation,
            );
        }

        Some(ResolvedMarker {
            x,
            y,
            size,
            color,
            icon,
            outline,
            label,
        })
    }
}

/// Rotates `point` around `pivot` by `degrees`.
#[must_use]
pub fn rotate_about(point: (f64, f64), pivot: (f64, f64), degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (dx, dy) = (point.0 - pivot.0, point.1 - pivot.1);
    (pivot.0 + dx * cos - dy * sin, pivot.1 + dx * sin + dy * cos)
}

/// Resolves every marker, dropping the hidden ones.
#[must_use]
pub fn resolve_all(markers: &[MapMarker], mapping: &ScreenMapping, ctx: &MarkerContext<'_>) -> Vec<ResolvedMarker> {
    markers.iter().filter_map(|m| m.resolve(mapping, ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::compute_scaled_size;
    use voxmap_common::WorldPos;

    fn mapping() -> ScreenMapping {
        ScreenMapping::new(WorldPos::new(0, 64, 0), (200, 200), compute_scaled_size(200, 200, 1.0))
    }

    fn entity(x: f64, z: f64, hostile: bool) -> MapMarker {
        MapMarker::Entity(EntityMarker {
            x,
            z,
            hostile,
            tameable: false,
            tamed: false,
            head: None,
        })
    }

    fn ctx(settings: &MapSettings) -> MarkerContext<'_> {
        MarkerContext {
            settings,
            origin: (10.0, 20.0),
            size: (200.0, 200.0),
            rotation: 0.0,
        }
    }

    #[test]
    fn test_entity_colors() {
        let settings = MapSettings::default();
        let m = mapping();
        let color = |marker: MapMarker| marker.resolve(&m, &ctx(&settings)).expect("visible").color;

        assert_eq!(color(entity(0.0, 0.0, true)), DARK_RED);
        assert_eq!(color(entity(0.0, 0.0, false)), YELLOW);
        let pet = |tamed| {
            MapMarker::Entity(EntityMarker {
                x: 0.0,
                z: 0.0,
                hostile: false,
                tameable: true,
                tamed,
                head: None,
            })
        };
        assert_eq!(color(pet(true)), GREEN);
        assert_eq!(color(pet(false)), YELLOW);
    }

    #[test]
    fn test_radar_gating() {
        let settings = MapSettings {
            hostile_radar: false,
            ..MapSettings::default()
        };
        let m = mapping();
        assert!(entity(0.0, 0.0, true).resolve(&m, &ctx(&settings)).is_none());
        assert!(entity(0.0, 0.0, false).resolve(&m, &ctx(&settings)).is_some());

        let settings = MapSettings {
            creature_radar: false,
            ..MapSettings::default()
        };
        assert!(entity(0.0, 0.0, false).resolve(&m, &ctx(&settings)).is_none());
        assert!(entity(0.0, 0.0, true).resolve(&m, &ctx(&settings)).is_some());
    }

    #[test]
    fn test_size_and_placement() {
        let settings = MapSettings {
            entity_icon_size: 8,
            ..MapSettings::default()
        };
        let m = mapping();
        let marker = entity(0.0, 0.0, false).resolve(&m, &ctx(&settings)).expect("visible");
        assert_eq!(marker.size, 8);
        assert_eq!((marker.x, marker.y), (10.0 + 100.0 - 4.0, 20.0 + 100.0 - 4.0));

        let settings = MapSettings {
            show_entity_heads: false,
            ..MapSettings::default()
        };
        let marker = entity(0.0, 0.0, false).resolve(&m, &ctx(&settings)).expect("visible");
        assert_eq!(marker.size, DOT_ICON_SIZE);
        assert_eq!(marker.icon, MarkerIcon::Dot { radius: 1.0 });
    }

    #[test]
    fn test_clipping() {
        let settings = MapSettings::default();
        let m = mapping();
        assert!(entity(99.0, 0.0, false).resolve(&m, &ctx(&settings)).is_none());
        assert!(entity(-101.0, 0.0, false).resolve(&m, &ctx(&settings)).is_none());
        assert!(entity(0.0, 200.0, false).resolve(&m, &ctx(&settings)).is_none());
        assert!(entity(90.0, -90.0, false).resolve(&m, &ctx(&settings)).is_some());

        let markers = vec![entity(0.0, 0.0, false), entity(500.0, 0.0, true)];
        assert_eq!(resolve_all(&markers, &m, &ctx(&settings)).len(), 1);
    }

    #[test]
    fn test_player_marker() {
        let settings = MapSettings {
            show_icons_outline: true,
            entity_outline_size: 2.0,
            creature_radar: false,
            hostile_radar: false,
            ..MapSettings::default()
        };
        let player = MapMarker::Player(PlayerMarker {
            x: 10.0,
            z: 10.0,
            name: "Steve".into(),
            head: Some(TextureHandle(3)),
        });
        let marker = player.resolve(&mapping(), &ctx(&settings)).expect("visible");
        assert_eq!(marker.icon, MarkerIcon::Head(TextureHandle(3)));
        assert_eq!(marker.label.as_deref(), Some("Steve"));
        assert_eq!(
            marker.outline,
            Some(Outline {
                thickness: 2.0,
                color: LIGHT_GRAY
            })
        );
    }

    #[test]
    fn test_rotation() {
        let settings = MapSettings {
            rotate_map: true,
            entity_icon_size: 2,
            ..MapSettings::default()
        };
        let mut c = ctx(&settings);
        c.origin = (0.0, 0.0);
        c.rotation = 90.0;
        // 50 blocks east of the center, icon corner one pixel up-left.
        let marker = entity(50.0, 0.0, false).resolve(&mapping(), &c).expect("visible");
        assert!((marker.x - 99.0).abs() < 1e-9);
        assert!((marker.y - 51.0).abs() < 1e-9);

        let (x, y) = rotate_about((1.0, 0.0), (0.0, 0.0), 90.0);
        assert!(x.abs() < 1e-12 && (y - 1.0).abs() < 1e-12);
    }
}
