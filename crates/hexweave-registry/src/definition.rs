//! Tile type ids and definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::handles::{ComponentRef, IconMaterial, NetworkComponentRef, PrefabRef};

/// Integer tile type id shared with the host's content tables.
///
/// Built-in host tiles occupy a reserved low range; custom tiles are
/// allocated above it by [`crate::TileRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileTypeId(pub i32);

impl TileTypeId {
    /// Sentinel returned when registration fails internally.
    pub const INVALID: TileTypeId = TileTypeId(-1);

    /// Whether this id was issued successfully.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// The id as a table index, if non-negative.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for TileTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an extension module hands to the registry.
///
/// Missing prefab or icon is accepted; the resulting definition is simply
/// marked invalid.
#[derive(Clone, Debug, Default)]
pub struct TileSpec {
    /// Spawnable content.
    pub prefab: Option<PrefabRef>,
    /// Map icon. A default is synthesized later when absent.
    pub icon: Option<IconMaterial>,
    /// Human-readable name. Defaults to `Custom Tile {id}`.
    pub display_name: Option<String>,
    /// Capabilities attached at spawn time, in order.
    pub components: Vec<ComponentRef>,
    /// Networked capabilities attached at spawn time, in order.
    pub network_components: Vec<NetworkComponentRef>,
}

impl TileSpec {
    /// A spec with the given prefab and icon and nothing else.
    pub fn new(prefab: Option<PrefabRef>, icon: Option<IconMaterial>) -> Self {
        Self {
            prefab,
            icon,
            ..Self::default()
        }
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the spawn-time components.
    pub fn with_components(mut self, components: Vec<ComponentRef>) -> Self {
        self.components = components;
        self
    }

    /// Set the spawn-time network components.
    pub fn with_network_components(mut self, components: Vec<NetworkComponentRef>) -> Self {
        self.network_components = components;
        self
    }
}

/// A registered tile type.
#[derive(Clone, Debug, PartialEq)]
pub struct TileDefinition {
    /// Assigned id; never changes after registration.
    pub id: TileTypeId,
    /// Spawnable content.
    pub prefab: Option<PrefabRef>,
    /// Map icon; may be backfilled with a synthesized default.
    pub icon: Option<IconMaterial>,
    /// Human-readable name.
    pub display_name: String,
    /// Capabilities attached at spawn time, in order.
    pub components: Vec<ComponentRef>,
    /// Networked capabilities attached at spawn time, in order.
    pub network_components: Vec<NetworkComponentRef>,
    /// Prefab and icon were both present at registration.
    pub valid: bool,
}

impl TileDefinition {
    pub(crate) fn from_spec(id: TileTypeId, spec: TileSpec) -> Self {
        let valid = spec.prefab.is_some() && spec.icon.is_some();
        Self {
            id,
            display_name: spec
                .display_name
                .unwrap_or_else(|| format!("Custom Tile {id}")),
            prefab: spec.prefab,
            icon: spec.icon,
            components: spec.components,
            network_components: spec.network_components,
            valid,
        }
    }

    /// Prefab name for logs, or `"NULL"`.
    pub fn prefab_name(&self) -> &str {
        self.prefab.as_ref().map_or("NULL", PrefabRef::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::TextureRef;

    #[test]
    fn test_valid_requires_prefab_and_icon() {
        let icon = IconMaterial::decal("icon", TextureRef::new("tex"));
        let both = TileSpec::new(Some(PrefabRef::new("p")), Some(icon.clone()));
        let no_icon = TileSpec::new(Some(PrefabRef::new("p")), None);
        let no_prefab = TileSpec::new(None, Some(icon));

        assert!(TileDefinition::from_spec(TileTypeId(9), both).valid);
        assert!(!TileDefinition::from_spec(TileTypeId(9), no_icon).valid);
        assert!(!TileDefinition::from_spec(TileTypeId(9), no_prefab).valid);
    }

    #[test]
    fn test_default_display_name() {
        let def = TileDefinition::from_spec(TileTypeId(12), TileSpec::default());
        assert_eq!(def.display_name, "Custom Tile 12");
        assert_eq!(def.prefab_name(), "NULL");
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!TileTypeId::INVALID.is_valid());
        assert_eq!(TileTypeId::INVALID.index(), None);
        assert_eq!(TileTypeId(4).index(), Some(4));
    }
}
