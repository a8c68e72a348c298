//! Opaque handles to content owned by the registering module.
//!
//! The registry only references these; it never builds or frees the
//! underlying assets. Every handle is `Arc`-backed so cloning a definition
//! snapshot is cheap.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

macro_rules! named_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a handle referring to the asset with the given name.
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                Self(name.into())
            }

            /// Name of the referenced asset.
            pub fn name(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

named_handle!(
    /// Spawnable tile content (the host's prefab).
    PrefabRef
);
named_handle!(
    /// A texture owned by the host's renderer.
    TextureRef
);
named_handle!(
    /// A capability attached to a spawned tile.
    ComponentRef
);
named_handle!(
    /// A networked capability attached to a spawned tile.
    NetworkComponentRef
);

/// A map-icon material: shader, texture, and rendering properties.
#[derive(Clone, Debug, PartialEq)]
pub struct IconMaterial {
    /// Material name, used in logs.
    pub name: String,
    /// Shader the material renders with.
    pub shader: String,
    /// Main texture.
    pub texture: Option<TextureRef>,
    /// Base color RGBA.
    pub color: [f32; 4],
    /// Remaining scalar shader properties.
    pub properties: BTreeMap<String, f32>,
}

impl IconMaterial {
    /// Shader used for map decals.
    pub const DECAL_SHADER: &'static str = "HDRP/Decal";

    /// A white decal material showing `texture`.
    pub fn decal(name: impl Into<String>, texture: TextureRef) -> Self {
        Self {
            name: name.into(),
            shader: Self::DECAL_SHADER.to_string(),
            texture: Some(texture),
            color: [1.0; 4],
            properties: BTreeMap::new(),
        }
    }

    /// Copy every rendering property of `template`, then show `texture` under a new name.
    pub fn from_template(
        template: &IconMaterial,
        name: impl Into<String>,
        texture: Option<TextureRef>,
    ) -> Self {
        Self {
            name: name.into(),
            texture,
            ..template.clone()
        }
    }
}
