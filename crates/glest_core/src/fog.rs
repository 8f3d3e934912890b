//! Per-player fog of war.
//!
//! Each player has two bitmaps over the map's integer cells: `visible`
//! (seen this tick) and `explored` (ever seen). Visibility is recomputed
//! from scratch every tick from the sight ranges of the player's live
//! units and buildings.

use std::collections::BTreeMap;

use crate::components::PlayerId;
use crate::math::{Fixed, Vec3Fixed};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlayerFog {
    visible: Vec<bool>,
    explored: Vec<bool>,
}

/// Visibility bitmaps for every player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FogOfWar {
    width: i32,
    height: i32,
    players: BTreeMap<PlayerId, PlayerFog>,
}

impl FogOfWar {
    /// Create an all-dark fog for a `width` × `height` map.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
            players: BTreeMap::new(),
        }
    }

    fn cells(&self) -> usize {
        usize::try_from(self.width * self.height).unwrap_or(0)
    }

    fn index(&self, x: i32, z: i32) -> Option<usize> {
        if x < 0 || z < 0 || x >= self.width || z >= self.height {
            return None;
        }
        usize::try_from(z * self.width + x).ok()
    }

    /// Start tracking a player.
    pub fn add_player(&mut self, player: PlayerId) {
        let cells = self.cells();
        self.players.entry(player).or_insert_with(|| PlayerFog {
            visible: vec![false; cells],
            explored: vec![false; cells],
        });
    }

    /// Recompute a player's visibility from `(position, sight)` pairs.
    pub fn refresh(&mut self, player: PlayerId, observers: &[(Vec3Fixed, Fixed)]) {
        let width = self.width;
        let height = self.height;
        let Some(fog) = self.players.get_mut(&player) else {
            return;
        };
        fog.visible.iter_mut().for_each(|v| *v = false);

        for &(position, sight) in observers {
            let cx: i32 = position.x.floor().to_num();
            let cz: i32 = position.z.floor().to_num();
            let radius: i32 = sight.ceil().to_num();
            let radius_sq = sight * sight;
            for z in (cz - radius).max(0)..=(cz + radius).min(height - 1) {
                for x in (cx - radius).max(0)..=(cx + radius).min(width - 1) {
                    let center = Vec3Fixed::ground(
                        Fixed::from_num(x) + Fixed::from_num(0.5),
                        Fixed::from_num(z) + Fixed::from_num(0.5),
                    );
                    if center.distance_squared(position) > radius_sq {
                        continue;
                    }
                    if let Ok(i) = usize::try_from(z * width + x) {
                        fog.visible[i] = true;
                        fog.explored[i] = true;
                    }
                }
            }
        }
    }

    /// Check whether a player currently sees a world position.
    #[must_use]
    pub fn is_visible(&self, player: PlayerId, position: Vec3Fixed) -> bool {
        self.lookup(player, position, |f| &f.visible)
    }

    /// Check whether a player has ever seen a world position.
    #[must_use]
    pub fn is_explored(&self, player: PlayerId, position: Vec3Fixed) -> bool {
        self.lookup(player, position, |f| &f.explored)
    }

    /// Number of cells a player currently sees.
    #[must_use]
    pub fn visible_count(&self, player: PlayerId) -> usize {
        self.players
            .get(&player)
            .map_or(0, |f| f.visible.iter().filter(|v| **v).count())
    }

    fn lookup(
        &self,
        player: PlayerId,
        position: Vec3Fixed,
        layer: impl Fn(&PlayerFog) -> &Vec<bool>,
    ) -> bool {
        let x: i32 = position.x.floor().to_num();
        let z: i32 = position.z.floor().to_num();
        match (self.players.get(&player), self.index(x, z)) {
            (Some(fog), Some(i)) => layer(fog)[i],
            _ => false,
        }
    }
}
