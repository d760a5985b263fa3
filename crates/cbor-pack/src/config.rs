//! Encoder switches.

use serde::{Deserialize, Serialize};

/// Encoding behavior, fixed for the lifetime of an [`Encoder`](crate::Encoder).
///
/// Derives serde so a caller's configuration layer can load it from any
/// format; missing keys fall back to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Emit map entries in canonical key order instead of source order.
    pub map_sort: bool,
    /// Accepted and reported, but does not change the emitted bytes.
    pub type_retention: bool,
}

impl EncoderConfig {
    /// Deterministic output: sorted maps, nothing else.
    pub const CANONICAL: EncoderConfig = EncoderConfig {
        map_sort: true,
        type_retention: false,
    };

    pub const fn new() -> Self {
        EncoderConfig {
            map_sort: false,
            type_retention: false,
        }
    }

    pub const fn with_map_sort(mut self, enabled: bool) -> Self {
        self.map_sort = enabled;
        self
    }

    pub const fn with_type_retention(mut self, enabled: bool) -> Self {
        self.type_retention = enabled;
        self
    }
}
