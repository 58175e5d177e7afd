//! Display colours for branches.

use serde::{Deserialize, Serialize};

/// Colour handed out when the palette is empty.
const FALLBACK_COLOR: &str = "#6b7280";

/// The built-in branch palette.
pub fn default_palette() -> Vec<String> {
    [
        "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4", "#f97316",
        "#14b8a6", "#a855f7",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Hands out colours from a fixed palette and takes them back when branches
/// are deleted.
///
/// A free palette colour is always preferred. Once every colour is taken the
/// allocator cycles through the palette by allocation count, so colours may
/// repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorAllocator {
    palette: Vec<String>,
    in_use: Vec<String>,
    allocations: usize,
}

impl ColorAllocator {
    pub fn new(palette: Vec<String>) -> Self {
        Self {
            palette,
            in_use: Vec::new(),
            allocations: 0,
        }
    }

    pub fn allocate(&mut self) -> String {
        let color = self
            .palette
            .iter()
            .find(|c| !self.in_use.contains(c))
            .cloned()
            .or_else(|| {
                self.palette
                    .get(self.allocations % self.palette.len().max(1))
                    .cloned()
            })
            .unwrap_or_else(|| FALLBACK_COLOR.to_string());
        self.in_use.push(color.clone());
        self.allocations += 1;
        color
    }

    /// Return one use of `color` to the pool.
    pub fn release(&mut self, color: &str) {
        if let Some(idx) = self.in_use.iter().position(|c| c == color) {
            self.in_use.remove(idx);
        }
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn in_use(&self) -> &[String] {
        &self.in_use
    }
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new(default_palette())
    }
}
