//! Map descriptors
//!
//! The simulation treats maps opaquely: an axis-aligned bounding box,
//! a spawn list, and the stance height players stand at. Three built-in
//! maps ship with the server; a JSON catalog can override them at startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifiers of the predefined maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapId {
    Arena,
    Tactical,
    Battlefield,
}

impl MapId {
    pub const ALL: [MapId; 3] = [MapId::Arena, MapId::Tactical, MapId::Battlefield];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapId::Arena => "arena",
            MapId::Tactical => "tactical",
            MapId::Battlefield => "battlefield",
        }
    }
}

impl std::str::FromStr for MapId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arena" => Ok(MapId::Arena),
            "tactical" => Ok(MapId::Tactical),
            "battlefield" => Ok(MapId::Battlefield),
            other => Err(format!("unknown map id: {other}")),
        }
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Axis-aligned map bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MapBounds {
    pub min: Point3,
    pub max: Point3,
}

impl MapBounds {
    /// Clamp an XZ position into the bounds.
    pub fn clamp_xz(&self, x: f32, z: f32) -> (f32, f32) {
        (
            x.clamp(self.min.x, self.max.x),
            z.clamp(self.min.z, self.max.z),
        )
    }

    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }
}

/// Map descriptor consumed at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescriptor {
    pub id: MapId,
    pub bounds: MapBounds,
    pub spawn_points: Vec<Point3>,
    pub stance_y: f32,
}

/// Eye/stance height shared by the built-in maps
pub const STANCE_Y: f32 = 1.8;

impl MapDescriptor {
    /// Built-in descriptor for a map id.
    ///
    /// The three maps differ only spatially: arena is a tight square,
    /// tactical a mid-size one, battlefield the largest.
    pub fn builtin(id: MapId) -> Self {
        match id {
            MapId::Arena => Self::square(id, 12.0, 8.0),
            MapId::Tactical => Self::square(id, 16.0, 11.0),
            MapId::Battlefield => Self::square(id, 24.0, 17.0),
        }
    }

    fn square(id: MapId, half_extent: f32, spawn_radius: f32) -> Self {
        // Eight spawns on a ring, matching the client's compass markers.
        let diag = spawn_radius * std::f32::consts::FRAC_1_SQRT_2;
        let spawn_points = vec![
            Point3::new(0.0, STANCE_Y, spawn_radius),
            Point3::new(diag, STANCE_Y, diag),
            Point3::new(spawn_radius, STANCE_Y, 0.0),
            Point3::new(diag, STANCE_Y, -diag),
            Point3::new(0.0, STANCE_Y, -spawn_radius),
            Point3::new(-diag, STANCE_Y, -diag),
            Point3::new(-spawn_radius, STANCE_Y, 0.0),
            Point3::new(-diag, STANCE_Y, diag),
        ];

        Self {
            id,
            bounds: MapBounds {
                min: Point3::new(-half_extent, 0.0, -half_extent),
                max: Point3::new(half_extent, STANCE_Y * 2.0, half_extent),
            },
            spawn_points,
            stance_y: STANCE_Y,
        }
    }
}

/// Catalog of maps available to new rooms
#[derive(Clone)]
pub struct MapCatalog {
    maps: HashMap<MapId, Arc<MapDescriptor>>,
}

impl MapCatalog {
    /// Catalog of the three built-in maps.
    pub fn builtin() -> Self {
        let maps = MapId::ALL
            .iter()
            .map(|&id| (id, Arc::new(MapDescriptor::builtin(id))))
            .collect();
        Self { maps }
    }

    /// Load a catalog from a JSON file (array of map descriptors).
    /// Maps not present in the file fall back to the built-ins.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let descriptors: Vec<MapDescriptor> = serde_json::from_str(&raw)?;

        let mut catalog = Self::builtin();
        for descriptor in descriptors {
            catalog.maps.insert(descriptor.id, Arc::new(descriptor));
        }
        Ok(catalog)
    }

    pub fn get(&self, id: MapId) -> Arc<MapDescriptor> {
        // Every MapId has a builtin entry, so the lookup cannot miss.
        Arc::clone(&self.maps[&id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_confines_position_to_bounds() {
        let map = MapDescriptor::builtin(MapId::Arena);
        let (x, z) = map.bounds.clamp_xz(100.0, -100.0);
        assert_eq!(x, map.bounds.max.x);
        assert_eq!(z, map.bounds.min.z);

        let (x, z) = map.bounds.clamp_xz(1.0, -2.0);
        assert_eq!((x, z), (1.0, -2.0));
    }

    #[test]
    fn builtin_spawns_are_in_bounds() {
        for id in MapId::ALL {
            let map = MapDescriptor::builtin(id);
            for spawn in &map.spawn_points {
                assert!(map.bounds.contains_xz(spawn.x, spawn.z), "{id}: {spawn:?}");
                assert_eq!(spawn.y, map.stance_y);
            }
        }
    }
}
