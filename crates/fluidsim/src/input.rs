use winit::dpi::PhysicalSize;

/// Pointer and touch events, queued as they arrive and drained at a fixed
/// point in each tick so splat ordering is independent of event timing.
#[derive(Clone, Copy, Debug)]
pub(crate) enum InputEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
}

/// State of the logical pointer. Multi-touch fans into this single instance,
/// which is mutated in place and never reallocated during a session.
#[derive(Clone, Debug)]
pub(crate) struct Pointer {
    pub texcoord: [f32; 2],
    pub prev_texcoord: [f32; 2],
    pub delta: [f32; 2],
    pub down: bool,
    pub moved: bool,
    pub color: [f32; 3],
}

impl Default for Pointer {
    fn default() -> Self {
        Self {
            texcoord: [0.0; 2],
            prev_texcoord: [0.0; 2],
            delta: [0.0; 2],
            down: false,
            moved: false,
            color: [0.0, 0.15, 0.0],
        }
    }
}

impl Pointer {
    /// Pointer-down: position in texture space (top-left origin, matching
    /// texture addressing), delta zeroed, fresh color assigned by the caller.
    pub fn press(&mut self, x: f32, y: f32, surface: PhysicalSize<u32>, color: [f32; 3]) {
        let coord = texcoord(x, y, surface);
        self.texcoord = coord;
        self.prev_texcoord = coord;
        self.delta = [0.0; 2];
        self.down = true;
        self.moved = false;
        self.color = color;
    }

    /// Pointer-move: shifts previous → current, recomputes the aspect-corrected
    /// delta, and flags motion only when the delta is nonzero.
    pub fn advance(&mut self, x: f32, y: f32, surface: PhysicalSize<u32>) {
        self.prev_texcoord = self.texcoord;
        self.texcoord = texcoord(x, y, surface);
        self.delta = [
            correct_delta_x(self.texcoord[0] - self.prev_texcoord[0], surface),
            correct_delta_y(self.texcoord[1] - self.prev_texcoord[1], surface),
        ];
        self.moved = self.delta[0].abs() > 0.0 || self.delta[1].abs() > 0.0;
    }

    /// Consumes the pending motion, if any. At most one splat per tick.
    pub fn take_motion(&mut self) -> Option<[f32; 2]> {
        if !self.moved {
            return None;
        }
        self.moved = false;
        Some(self.delta)
    }
}

// Window and texture space share the top-left origin, so no axis flips.
fn texcoord(x: f32, y: f32, surface: PhysicalSize<u32>) -> [f32; 2] {
    let width = surface.width.max(1) as f32;
    let height = surface.height.max(1) as f32;
    [x / width, y / height]
}

/// Deltas are scaled down along the longer screen axis so a diagonal drag
/// feels isotropic on non-square surfaces.
fn correct_delta_x(delta: f32, surface: PhysicalSize<u32>) -> f32 {
    let aspect = surface.width.max(1) as f32 / surface.height.max(1) as f32;
    if aspect < 1.0 {
        delta * aspect
    } else {
        delta
    }
}

fn correct_delta_y(delta: f32, surface: PhysicalSize<u32>) -> f32 {
    let aspect = surface.width.max(1) as f32 / surface.height.max(1) as f32;
    if aspect > 1.0 {
        delta / aspect
    } else {
        delta
    }
}

/// Wraps `value` into `[min, max)`; a zero-width range collapses to `min`.
pub(crate) fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range <= 0.0 {
        return min;
    }
    (value - min).rem_euclid(range) + min
}

/// Intensity applied to palette colors so a single splat stays subtle.
const COLOR_INTENSITY: f32 = 0.15;

/// Hues cycled for successive pointer colors, in turns.
const PALETTE_HUES: [f32; 6] = [0.0, 1.0 / 6.0, 2.0 / 6.0, 3.0 / 6.0, 4.0 / 6.0, 5.0 / 6.0];

/// Rotates the pointer color on a timer independent of splatting.
#[derive(Debug, Default)]
pub(crate) struct ColorCycle {
    timer: f32,
    cursor: usize,
}

impl ColorCycle {
    /// Advances the timer by `dt * speed` cycles; returns true when the timer
    /// wraps, meaning the pointer should pick up a fresh color.
    pub fn advance(&mut self, dt: f32, speed: f32) -> bool {
        self.timer += dt * speed;
        if self.timer >= 1.0 {
            self.timer = wrap(self.timer, 0.0, 1.0);
            true
        } else {
            false
        }
    }

    /// Next palette color, scaled down in intensity.
    pub fn next_color(&mut self) -> [f32; 3] {
        let hue = PALETTE_HUES[self.cursor % PALETTE_HUES.len()];
        self.cursor = (self.cursor + 1) % PALETTE_HUES.len();
        let [r, g, b] = hsv_to_rgb(hue, 1.0, 1.0);
        [r * COLOR_INTENSITY, g * COLOR_INTENSITY, b * COLOR_INTENSITY]
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: PhysicalSize<u32> = PhysicalSize::new(800, 600);

    #[test]
    fn press_maps_to_texture_space_and_zeroes_delta() {
        let mut pointer = Pointer::default();
        pointer.press(400.0, 0.0, SURFACE, [0.1, 0.0, 0.0]);
        // Window top row is texture v = 0.
        assert_eq!(pointer.texcoord, [0.5, 0.0]);
        assert_eq!(pointer.delta, [0.0, 0.0]);
        assert!(pointer.down);
        assert!(!pointer.moved);
    }

    #[test]
    fn move_sets_motion_flag_only_when_nonzero() {
        let mut pointer = Pointer::default();
        pointer.press(400.0, 300.0, SURFACE, [0.1, 0.0, 0.0]);
        pointer.advance(400.0, 300.0, SURFACE);
        assert!(!pointer.moved);
        pointer.advance(410.0, 300.0, SURFACE);
        assert!(pointer.moved);
    }

    #[test]
    fn motion_is_consumed_once() {
        let mut pointer = Pointer::default();
        pointer.press(100.0, 100.0, SURFACE, [0.1, 0.0, 0.0]);
        pointer.advance(150.0, 120.0, SURFACE);
        assert!(pointer.take_motion().is_some());
        assert!(pointer.take_motion().is_none());
    }

    #[test]
    fn landscape_damps_vertical_delta() {
        // Width is the longer axis, so the y delta is divided by the aspect.
        let mut pointer = Pointer::default();
        pointer.press(400.0, 300.0, SURFACE, [0.1, 0.0, 0.0]);
        pointer.advance(400.0, 360.0, SURFACE);
        let raw_dy = 60.0 / 600.0;
        let expected = raw_dy / (800.0 / 600.0);
        assert!((pointer.delta[1] - expected).abs() < 1e-6);
        assert_eq!(pointer.delta[0], 0.0);
    }

    #[test]
    fn portrait_damps_horizontal_delta() {
        let surface = PhysicalSize::new(600, 800);
        let mut pointer = Pointer::default();
        pointer.press(300.0, 400.0, surface, [0.1, 0.0, 0.0]);
        pointer.advance(360.0, 400.0, surface);
        let raw_dx = 60.0 / 600.0;
        let expected = raw_dx * (600.0 / 800.0);
        assert!((pointer.delta[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn wrap_stays_in_range() {
        for value in [-3.7_f32, -0.2, 0.0, 0.4, 1.0, 2.6, 42.0] {
            let wrapped = wrap(value, 0.0, 1.0);
            assert!((0.0..1.0).contains(&wrapped), "wrap({value}) = {wrapped}");
        }
    }

    #[test]
    fn wrap_with_zero_range_returns_min() {
        assert_eq!(wrap(5.0, 2.0, 2.0), 2.0);
    }

    #[test]
    fn color_cycle_wraps_on_schedule() {
        let mut cycle = ColorCycle::default();
        // 10 cycles/sec at 1/60 s per tick wraps after six ticks.
        let mut wraps = 0;
        for _ in 0..6 {
            if cycle.advance(1.0 / 60.0, 10.0) {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
    }

    #[test]
    fn palette_colors_are_scaled_and_distinct() {
        let mut cycle = ColorCycle::default();
        let first = cycle.next_color();
        let second = cycle.next_color();
        assert_ne!(first, second);
        for channel in first.iter().chain(second.iter()) {
            assert!(*channel <= COLOR_INTENSITY + 1e-6);
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green[1] > 0.99 && green[0] < 0.01);
    }
}
