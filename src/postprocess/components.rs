// Largest-component filter.
//
// A raster scan seeds a new component at every unvisited cell above the threshold and
// grows it over the 4-neighbourhood with an explicit stack, so a grid that is entirely
// foreground costs one Vec of W*H indices instead of W*H call frames. Every scratch grid is
// sized once in `new` and cleared in place at the start of each pass.
//
// The same threshold decides both seeding and expansion.

use crate::error::{OverlayError, Result};

/// Result of one filter pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Only the component with this label survived
    Retained { label: u32, pixels: usize },
    /// No cell exceeded the threshold; the grid is now all zero
    NoForeground,
}

impl FilterOutcome {
    pub fn pixels(&self) -> usize {
        match self {
            Self::Retained { pixels, .. } => *pixels,
            Self::NoForeground => 0,
        }
    }
}

/// Keeps the single largest 4-connected foreground region of a probability grid
pub struct ComponentFilter {
    width: usize,
    height: usize,
    threshold: f32,
    /// Component id per cell, 0 = not foreground. Labels start at 1.
    labels: Vec<u32>,
    visited: Vec<bool>,
    stack: Vec<usize>,
    /// Pixel count of label `i + 1`
    counts: Vec<usize>,
}

impl ComponentFilter {
    pub fn new(width: u32, height: u32, threshold: f32) -> Self {
        let width = width as usize;
        let height = height as usize;
        let len = width * height;
        Self {
            width,
            height,
            threshold,
            labels: vec![0; len],
            visited: vec![false; len],
            stack: Vec::with_capacity(len),
            counts: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel counts of the components found by the last pass, in discovery order
    pub fn component_sizes(&self) -> &[usize] {
        &self.counts
    }

    /// Label grid from the last pass
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Zero every cell that is not part of the largest foreground component
    ///
    /// Ties go to the component discovered first in raster order.
    pub fn apply(&mut self, grid: &mut [f32]) -> Result<FilterOutcome> {
        let _span = tracing::debug_span!("component_filter").entered();

        if grid.len() != self.len() {
            return Err(OverlayError::DimensionMismatch {
                expected: self.len(),
                actual: grid.len(),
            });
        }

        self.visited.fill(false);
        self.labels.fill(0);
        self.counts.clear();

        for seed in 0..grid.len() {
            if self.visited[seed] || !(grid[seed] > self.threshold) {
                continue;
            }
            let label = self.counts.len() as u32 + 1;
            let pixels = self.flood_fill(grid, seed, label);
            self.counts.push(pixels);
        }

        let mut winner: Option<(u32, usize)> = None;
        for (i, &pixels) in self.counts.iter().enumerate() {
            if winner.map_or(true, |(_, best)| pixels > best) {
                winner = Some((i as u32 + 1, pixels));
            }
        }

        match winner {
            Some((label, pixels)) => {
                for (value, &cell_label) in grid.iter_mut().zip(self.labels.iter()) {
                    if cell_label != label {
                        *value = 0.0;
                    }
                }
                tracing::debug!(
                    "Kept component {} ({} px) of {}",
                    label,
                    pixels,
                    self.counts.len()
                );
                Ok(FilterOutcome::Retained { label, pixels })
            }
            None => {
                grid.fill(0.0);
                Ok(FilterOutcome::NoForeground)
            }
        }
    }

    fn flood_fill(&mut self, grid: &[f32], seed: usize, label: u32) -> usize {
        let (width, height) = (self.width, self.height);
        let mut pixels = 0;

        self.stack.clear();
        self.stack.push(seed);
        self.visited[seed] = true;

        while let Some(idx) = self.stack.pop() {
            self.labels[idx] = label;
            pixels += 1;

            let x = idx % width;
            let y = idx / width;

            // up, down, left, right
            let mut visit = |n: usize| {
                if !self.visited[n] && grid[n] > self.threshold {
                    self.visited[n] = true;
                    self.stack.push(n);
                }
            };
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
        }

        pixels
    }
}
