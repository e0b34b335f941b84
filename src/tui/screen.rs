use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;

use crate::util::unicode;

/// Marker stored in the cell after a double-width character. Printed as
/// nothing; the wide glyph to its left covers the column.
const CONTINUATION: char = '\0';

/// Styling applied to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl CellStyle {
    pub fn fg(color: Color) -> CellStyle {
        CellStyle {
            fg: Some(color),
            ..CellStyle::default()
        }
    }

    pub fn on(mut self, color: Color) -> CellStyle {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> CellStyle {
        self.bold = true;
        self
    }

    pub fn underlined(mut self) -> CellStyle {
        self.underline = true;
        self
    }
}

/// One terminal cell: a character plus its styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            style: CellStyle::default(),
        }
    }
}

/// A width × height grid of cells.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl ScreenBuffer {
    fn new(width: u16, height: u16) -> ScreenBuffer {
        ScreenBuffer {
            width,
            height,
            cells: vec![Cell::default(); usize::from(width) * usize::from(height)],
        }
    }

    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.cells[i] = cell;
        }
    }

    fn fill_default(&mut self) {
        self.cells.fill(Cell::default());
    }
}

/// Double-buffered differential compositor. Callers draw freely into the
/// back buffer; `render` emits only the cells that changed since the last
/// frame, batched into per-row runs with one buffered flush.
///
/// The front buffer always reflects exactly what has been written to the
/// terminal.
pub struct Screen {
    front: ScreenBuffer,
    back: ScreenBuffer,
    full_refresh: bool,
    /// Where the cursor should rest after content is flushed; None hides it.
    desired_cursor: Option<(u16, u16)>,
    /// Cursor state last sent to the terminal, to suppress no-op updates.
    emitted_cursor: Option<Option<(u16, u16)>>,
}

impl Screen {
    pub fn new(width: u16, height: u16) -> Screen {
        Screen {
            front: ScreenBuffer::new(width, height),
            back: ScreenBuffer::new(width, height),
            full_refresh: true,
            desired_cursor: None,
            emitted_cursor: None,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.back.width, self.back.height)
    }

    pub fn width(&self) -> u16 {
        self.back.width
    }

    pub fn height(&self) -> u16 {
        self.back.height
    }

    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell) {
        self.back.set(x, y, cell);
    }

    /// Write a string starting at (x, y), clipping at the right edge.
    /// Returns the column after the last cell written. Double-width
    /// characters occupy two cells.
    pub fn set_text(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> u16 {
        let mut col = x;
        for ch in text.chars() {
            if col >= self.back.width || y >= self.back.height {
                break;
            }
            let w = unicode::char_width(ch);
            if w == 0 {
                continue;
            }
            if w == 2 && col + 1 >= self.back.width {
                // Wide char would straddle the edge: pad with a space
                self.back.set(col, y, Cell { ch: ' ', style });
                col += 1;
                break;
            }
            self.back.set(col, y, Cell { ch, style });
            if w == 2 {
                self.back.set(
                    col + 1,
                    y,
                    Cell {
                        ch: CONTINUATION,
                        style,
                    },
                );
            }
            col += w as u16;
        }
        col
    }

    /// Reset a rectangle of the back buffer to blank cells.
    pub fn clear_region(&mut self, x: u16, y: u16, w: u16, h: u16) {
        for row in y..y.saturating_add(h).min(self.back.height) {
            for col in x..x.saturating_add(w).min(self.back.width) {
                self.back.set(col, row, Cell::default());
            }
        }
    }

    /// Blank the entire back buffer (start of a fresh frame).
    pub fn clear_all(&mut self) {
        self.back.fill_default();
    }

    /// Reallocate both buffers at the new dimensions, best-effort copying
    /// the overlapping top-left region, and schedule a full repaint.
    pub fn resize(&mut self, width: u16, height: u16) {
        let mut front = ScreenBuffer::new(width, height);
        let mut back = ScreenBuffer::new(width, height);
        for y in 0..height.min(self.front.height) {
            for x in 0..width.min(self.front.width) {
                if let Some(cell) = self.front.get(x, y) {
                    front.set(x, y, *cell);
                }
                if let Some(cell) = self.back.get(x, y) {
                    back.set(x, y, *cell);
                }
            }
        }
        self.front = front;
        self.back = back;
        self.full_refresh = true;
    }

    /// Set where the cursor should rest once content is flushed; `None`
    /// hides it. Supports an editable prompt coexisting with the grid.
    pub fn set_cursor(&mut self, pos: Option<(u16, u16)>) {
        self.desired_cursor = pos;
    }

    /// Force the next render to clear and repaint every cell.
    pub fn force_refresh(&mut self) {
        self.full_refresh = true;
    }

    /// Read a back-buffer cell. Lets callers (and tests) probe what the
    /// next frame will show without touching the terminal.
    pub fn buffer_cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.back.get(x, y)
    }

    /// Diff back against front and emit the minimal batched update. On
    /// I/O failure the error is logged and the next frame repaints fully;
    /// the frame loop never dies on a render error.
    pub fn render(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.render_inner(out) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "render failed; scheduling full refresh");
                self.full_refresh = true;
                Err(e)
            }
        }
    }

    fn render_inner(&mut self, out: &mut impl Write) -> io::Result<()> {
        let mut wrote = false;

        if self.full_refresh {
            queue!(out, Hide, Clear(ClearType::All))?;
            for y in 0..self.back.height {
                let width = self.back.width;
                if width > 0 {
                    queue!(out, MoveTo(0, y))?;
                    self.emit_run(out, 0, y, width)?;
                }
            }
            self.full_refresh = false;
            wrote = true;
        } else {
            let runs = self.changed_runs();
            if !runs.is_empty() {
                queue!(out, Hide)?;
                let mut after_prev: Option<(u16, u16)> = None;
                for (x, y, len) in runs {
                    // Skip the cursor move when the previous run left the
                    // cursor exactly here
                    if after_prev != Some((x, y)) {
                        queue!(out, MoveTo(x, y))?;
                    }
                    self.emit_run(out, x, y, len)?;
                    after_prev = Some((x + len, y));
                }
                wrote = true;
            }
        }

        // Final cursor placement; skipped entirely when nothing changed
        if wrote || self.emitted_cursor != Some(self.desired_cursor) {
            match self.desired_cursor {
                Some((x, y)) => queue!(out, MoveTo(x, y), Show)?,
                None => queue!(out, Hide)?,
            }
            self.emitted_cursor = Some(self.desired_cursor);
            wrote = true;
        }

        if wrote {
            out.flush()?;
            self.front = self.back.clone();
        }
        Ok(())
    }

    /// Maximal horizontally-contiguous changed-cell runs, row-major. A run
    /// never starts on a continuation cell: it is widened to include the
    /// wide character that owns it.
    fn changed_runs(&self) -> Vec<(u16, u16, u16)> {
        let mut runs = Vec::new();
        for y in 0..self.back.height {
            let mut x = 0;
            while x < self.back.width {
                if self.back.get(x, y) == self.front.get(x, y) {
                    x += 1;
                    continue;
                }
                let mut start = x;
                if self
                    .back
                    .get(start, y)
                    .is_some_and(|c| c.ch == CONTINUATION)
                    && start > 0
                {
                    start -= 1;
                }
                let mut end = x + 1;
                while end < self.back.width && self.back.get(end, y) != self.front.get(end, y) {
                    end += 1;
                }
                // A run ending just before a continuation cell must carry it
                if end < self.back.width
                    && self.back.get(end, y).is_some_and(|c| c.ch == CONTINUATION)
                {
                    end += 1;
                }
                runs.push((start, y, end - start));
                x = end;
            }
        }
        runs
    }

    /// Emit one run as a single styled stretch: style codes only when the
    /// style changes between cells, one reset at the end. The caller has
    /// already positioned the cursor.
    fn emit_run(&self, out: &mut impl Write, x: u16, y: u16, len: u16) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        let mut current: Option<CellStyle> = None;
        for col in x..x + len {
            let Some(cell) = self.back.get(col, y) else {
                break;
            };
            if cell.ch == CONTINUATION {
                continue;
            }
            if current != Some(cell.style) {
                queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
                if let Some(fg) = cell.style.fg {
                    queue!(out, SetForegroundColor(fg))?;
                }
                if let Some(bg) = cell.style.bg {
                    queue!(out, SetBackgroundColor(bg))?;
                }
                if cell.style.bold {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                if cell.style.italic {
                    queue!(out, SetAttribute(Attribute::Italic))?;
                }
                if cell.style.underline {
                    queue!(out, SetAttribute(Attribute::Underlined))?;
                }
                current = Some(cell.style);
            }
            queue!(out, Print(cell.ch))?;
        }
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}
