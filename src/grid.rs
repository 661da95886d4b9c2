use serde::{Deserialize, Serialize};

/// Horizontal distribution of children within a grid row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Justify {
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceEvenly,
    Stretch,
    /// Default; unrecognized tokens degrade here as well.
    #[default]
    #[serde(other)]
    SpaceAround,
}

/// Default column count for a grouping grid.
pub const DEFAULT_COLUMNS: usize = 12;
/// Default gap between grid cells, both axes.
pub const DEFAULT_SPACING: f32 = 24.0;
/// Height reserved at the top of a container for its name chip.
pub const LABEL_BAND: f32 = 32.0;
/// Packing attempts allowed while chasing a row target.
const MAX_FIT_ATTEMPTS: usize = 24;
/// Widest span a child takes when it carries no hint.
const DEFAULT_SPAN_CAP: usize = 6;

/// One direct child to arrange, with its size already resolved.
#[derive(Debug, Clone)]
pub struct GridChild {
    pub id: String,
    pub width: f32,
    pub height: f32,
    /// Requested span in columns; clamped to `1..=columns`.
    pub span: Option<u32>,
}

/// Effective grid options for one grouping container.
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub columns: usize,
    /// Target row count; packing widens the grid to approach it.
    pub rows: Option<usize>,
    pub spacing: f32,
    pub justify: Justify,
    /// The grouping's kind base size, the floor for the container.
    pub base_width: f32,
    pub base_height: f32,
    /// Inset between the container border and the content box.
    pub padding: f32,
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec {
            columns: DEFAULT_COLUMNS,
            rows: None,
            spacing: DEFAULT_SPACING,
            justify: Justify::default(),
            base_width: 240.0,
            base_height: 240.0,
            padding: 56.0,
        }
    }
}

/// Where one child landed, offsets relative to the grouping's own origin.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSlot {
    pub id: String,
    pub row: usize,
    /// Starting column index.
    pub column: usize,
    pub x: f32,
    pub y: f32,
}

/// Computed arrangement for one grouping container.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPlan {
    /// Column extent actually used by the packing (after retries).
    pub columns: usize,
    pub rows: usize,
    /// Container size: `max(base, content + padding + label band)`.
    pub width: f32,
    pub height: f32,
    pub placements: Vec<GridSlot>,
}

struct Packed {
    child: usize,
    span: usize,
    column: usize,
}

/// Arrange `children` into the grid described by `spec`.
pub fn arrange(children: &[GridChild], spec: &GridSpec) -> GridPlan {
    if children.is_empty() {
        return GridPlan {
            columns: spec.columns.max(1),
            rows: 0,
            width: spec.base_width,
            height: spec.base_height + LABEL_BAND,
            placements: Vec::new(),
        };
    }

    let mut columns = spec.columns.max(1);
    let mut rows = pack_rows(children, columns);
    if let Some(target) = spec.rows {
        let target = target.max(1);
        let mut attempts = 1;
        // Retries exhausted -> the widest attempt is accepted as-is.
        while rows.len() > target && attempts < MAX_FIT_ATTEMPTS {
            columns += 1;
            rows = pack_rows(children, columns);
            attempts += 1;
        }
    }

    let used_columns = rows
        .iter()
        .flatten()
        .map(|p| p.column + p.span)
        .max()
        .unwrap_or(1);

    let mut column_widths = vec![0.0f32; used_columns];
    for packed in rows.iter().flatten() {
        let per_column = children[packed.child].width / packed.span as f32;
        for idx in packed.column..(packed.column + packed.span).min(used_columns) {
            column_widths[idx] = column_widths[idx].max(per_column);
        }
    }
    let content_width = column_widths.iter().sum::<f32>()
        + spec.spacing * used_columns.saturating_sub(1) as f32;

    let row_heights: Vec<f32> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|p| children[p.child].height)
                .fold(0.0, f32::max)
        })
        .collect();
    let content_height = row_heights.iter().sum::<f32>()
        + spec.spacing * row_heights.len().saturating_sub(1) as f32;

    let mut row_y = Vec::with_capacity(row_heights.len());
    let mut cursor = 0.0f32;
    for height in &row_heights {
        row_y.push(cursor);
        cursor += height + spec.spacing;
    }

    let origin_x = spec.padding;
    let origin_y = spec.padding + LABEL_BAND;
    let mut placements = Vec::with_capacity(children.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let widths: Vec<f32> = row.iter().map(|p| children[p.child].width).collect();
        let offsets = justify_offsets(&widths, content_width, spec.spacing, spec.justify);
        for (packed, x) in row.iter().zip(offsets) {
            let child = &children[packed.child];
            placements.push(GridSlot {
                id: child.id.clone(),
                row: row_idx,
                column: packed.column,
                x: origin_x + x,
                y: origin_y + row_y[row_idx] + (row_heights[row_idx] - child.height) / 2.0,
            });
        }
    }

    GridPlan {
        columns: used_columns,
        rows: rows.len(),
        width: (content_width + spec.padding * 2.0).max(spec.base_width),
        height: (content_height + spec.padding * 2.0 + LABEL_BAND)
            .max(spec.base_height + LABEL_BAND),
        placements,
    }
}

fn pack_rows(children: &[GridChild], columns: usize) -> Vec<Vec<Packed>> {
    let mut rows: Vec<Vec<Packed>> = Vec::new();
    let mut current: Vec<Packed> = Vec::new();
    let mut col = 0usize;
    for (idx, child) in children.iter().enumerate() {
        let requested = child
            .span
            .map(|s| s.max(1) as usize)
            .unwrap_or_else(|| columns.min(DEFAULT_SPAN_CAP));
        let span = requested.min(columns);
        if col + span > columns && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            col = 0;
        }
        current.push(Packed {
            child: idx,
            span,
            column: col,
        });
        col += span;
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

/// Per-item x offsets for one row, distributed over `available` width.
/// `start`/`center`/`end` pack items with the configured spacing; the
/// `space-*` modes derive their gaps from the leftover width (clamped at
/// zero when the row overflows).
pub fn justify_offsets(widths: &[f32], available: f32, spacing: f32, justify: Justify) -> Vec<f32> {
    let n = widths.len();
    if n == 0 {
        return Vec::new();
    }
    let content: f32 = widths.iter().sum();
    let packed = content + spacing * (n - 1) as f32;
    let leftover = (available - content).max(0.0);

    let (lead, gap) = match justify {
        Justify::Start => (0.0, spacing),
        Justify::Center => (((available - packed) / 2.0).max(0.0), spacing),
        Justify::End => ((available - packed).max(0.0), spacing),
        Justify::SpaceBetween => {
            if n == 1 {
                (0.0, 0.0)
            } else {
                (0.0, leftover / (n - 1) as f32)
            }
        }
        Justify::SpaceEvenly => {
            let gap = leftover / (n + 1) as f32;
            (gap, gap)
        }
        Justify::Stretch | Justify::SpaceAround => {
            let gap = leftover / n as f32;
            (gap / 2.0, gap)
        }
    };

    let mut offsets = Vec::with_capacity(n);
    let mut cursor = lead;
    for width in widths {
        offsets.push(cursor);
        cursor += width + gap;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: &str, width: f32, height: f32) -> GridChild {
        GridChild {
            id: id.to_string(),
            width,
            height,
            span: Some(1),
        }
    }

    #[test]
    fn space_between_has_flush_first_item_and_even_gaps() {
        let offsets = justify_offsets(&[100.0, 100.0, 100.0], 400.0, 24.0, Justify::SpaceBetween);
        assert_eq!(offsets, vec![0.0, 150.0, 300.0]);
        assert_eq!(offsets[1] - (offsets[0] + 100.0), 50.0);
        assert_eq!(offsets[2] - (offsets[1] + 100.0), 50.0);
    }

    #[test]
    fn space_evenly_includes_both_ends() {
        let offsets = justify_offsets(&[100.0, 100.0], 320.0, 24.0, Justify::SpaceEvenly);
        // leftover 120 over three gaps.
        assert_eq!(offsets, vec![40.0, 180.0]);
    }

    #[test]
    fn space_around_leads_with_half_gap() {
        let offsets = justify_offsets(&[100.0, 100.0], 300.0, 24.0, Justify::SpaceAround);
        // gap = 100 / 2 = 50, lead 25.
        assert_eq!(offsets, vec![25.0, 175.0]);
    }

    #[test]
    fn start_and_end_pack_with_spacing() {
        let start = justify_offsets(&[50.0, 50.0], 300.0, 20.0, Justify::Start);
        assert_eq!(start, vec![0.0, 70.0]);
        let end = justify_offsets(&[50.0, 50.0], 300.0, 20.0, Justify::End);
        assert_eq!(end, vec![180.0, 250.0]);
    }

    #[test]
    fn overflowing_row_clamps_gaps_to_zero() {
        let offsets = justify_offsets(&[300.0, 300.0], 400.0, 24.0, Justify::SpaceBetween);
        assert_eq!(offsets, vec![0.0, 300.0]);
    }

    #[test]
    fn five_children_in_two_columns_make_three_rows() {
        let children: Vec<GridChild> = (0..5)
            .map(|i| child(&format!("c{i}"), 160.0, 160.0))
            .collect();
        let spec = GridSpec {
            columns: 2,
            ..GridSpec::default()
        };
        let plan = arrange(&children, &spec);
        assert_eq!(plan.rows, 3);
        let rows: Vec<usize> = plan.placements.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![0, 0, 1, 1, 2]);
        // Content: 3 rows of 160 + 2 gaps, plus padding both sides and the
        // label band.
        let content_height = 3.0 * 160.0 + 2.0 * spec.spacing;
        assert!(plan.height >= content_height + spec.padding + LABEL_BAND);
    }

    #[test]
    fn row_heights_take_the_tallest_child() {
        let children = vec![
            child("a", 100.0, 80.0),
            child("b", 100.0, 140.0),
            child("c", 100.0, 60.0),
        ];
        let spec = GridSpec {
            columns: 2,
            justify: Justify::Start,
            ..GridSpec::default()
        };
        let plan = arrange(&children, &spec);
        let a = plan.placements.iter().find(|p| p.id == "a").unwrap();
        let b = plan.placements.iter().find(|p| p.id == "b").unwrap();
        let c = plan.placements.iter().find(|p| p.id == "c").unwrap();
        // Row 0 is 140 tall; the shorter child is centered inside it.
        assert_eq!(a.y, spec.padding + LABEL_BAND + 30.0);
        assert_eq!(b.y, spec.padding + LABEL_BAND);
        assert_eq!(c.row, 1);
        assert_eq!(c.y, spec.padding + LABEL_BAND + 140.0 + spec.spacing);
    }

    #[test]
    fn row_target_widens_the_grid() {
        let children: Vec<GridChild> = (0..4)
            .map(|i| child(&format!("c{i}"), 100.0, 100.0))
            .collect();
        let spec = GridSpec {
            columns: 2,
            rows: Some(1),
            ..GridSpec::default()
        };
        let plan = arrange(&children, &spec);
        assert_eq!(plan.rows, 1);
        assert_eq!(plan.columns, 4);
    }

    #[test]
    fn unreachable_row_target_accepts_best_attempt() {
        let children: Vec<GridChild> = (0..30)
            .map(|i| child(&format!("c{i}"), 40.0, 40.0))
            .collect();
        let spec = GridSpec {
            columns: 1,
            rows: Some(1),
            ..GridSpec::default()
        };
        let plan = arrange(&children, &spec);
        // 24 attempts stop at 24 columns; 30 children still need two rows.
        assert_eq!(plan.rows, 2);
    }

    #[test]
    fn hintless_children_default_to_half_width_span() {
        let children: Vec<GridChild> = (0..3)
            .map(|i| GridChild {
                id: format!("c{i}"),
                width: 160.0,
                height: 160.0,
                span: None,
            })
            .collect();
        let plan = arrange(&children, &GridSpec::default());
        // Span 6 of 12: two per row.
        let rows: Vec<usize> = plan.placements.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![0, 0, 1]);
    }

    #[test]
    fn oversized_span_is_clamped_to_the_grid() {
        let children = vec![GridChild {
            id: "wide".to_string(),
            width: 500.0,
            height: 100.0,
            span: Some(40),
        }];
        let spec = GridSpec {
            columns: 3,
            ..GridSpec::default()
        };
        let plan = arrange(&children, &spec);
        assert_eq!(plan.placements[0].column, 0);
        assert_eq!(plan.columns, 3);
    }

    #[test]
    fn empty_grouping_keeps_base_size_plus_label_band() {
        let plan = arrange(&[], &GridSpec::default());
        assert_eq!(plan.width, 240.0);
        assert_eq!(plan.height, 240.0 + LABEL_BAND);
        assert!(plan.placements.is_empty());
    }

    #[test]
    fn unknown_justify_token_degrades_to_space_around() {
        let justify: Justify = serde_json::from_str("\"space-weird\"").unwrap();
        assert_eq!(justify, Justify::SpaceAround);
        let known: Justify = serde_json::from_str("\"space-between\"").unwrap();
        assert_eq!(known, Justify::SpaceBetween);
    }
}
