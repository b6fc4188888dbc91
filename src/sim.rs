// Ball physics: a flat arena of balls with velocities fixed at spawn.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::shared::{BALL_RADIUS, CANVAS_HEIGHT, CANVAS_WIDTH, SPAWN_VELOCITY_RANGE, WALL_MARGIN};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BallId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Ball {
    pub id: BallId,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub color: (u8, u8, u8), // display only, the engine never reads it
    pub radius: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal, // bounced off the left or right wall
    Vertical,   // bounced off the top or bottom wall
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    pub ball: BallId,
    pub axis: Axis,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

pub struct BallSimulator {
    bounds: Bounds,
    balls: Vec<Ball>,
    next_id: u64,
    rng: StdRng,
}

impl BallSimulator {
    pub fn new(bounds: Bounds) -> Self {
        Self::with_rng(bounds, StdRng::from_entropy())
    }

    pub fn with_seed(bounds: Bounds, seed: u64) -> Self {
        Self::with_rng(bounds, StdRng::seed_from_u64(seed))
    }

    fn with_rng(bounds: Bounds, rng: StdRng) -> Self {
        Self {
            bounds,
            balls: Vec::new(),
            next_id: 0,
            rng,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    /// Spawn a ball at `(x, y)`. `speed_scale` is clamped to `[0, 1]` and only
    /// shapes the velocity drawn here; it is never reapplied afterwards.
    pub fn spawn(&mut self, x: f64, y: f64, speed_scale: f64) -> BallId {
        let scale = if speed_scale.is_finite() { speed_scale.clamp(0.0, 1.0) } else { 1.0 };
        let dx = self.rng.gen_range(-0.5_f64..=0.5) * SPAWN_VELOCITY_RANGE * scale;
        let dy = self.rng.gen_range(-0.5_f64..=0.5) * SPAWN_VELOCITY_RANGE * scale;
        let color = (self.rng.gen_range(0..=255), self.rng.gen_range(0..=255), self.rng.gen_range(0..=255));
        self.spawn_with_velocity(x, y, dx, dy, color)
    }

    /// Anywhere inside the wall margins; an axis too short to have an
    /// inside spawns at its centre.
    pub fn spawn_random(&mut self, speed_scale: f64) -> BallId {
        let x = self.inside(self.bounds.width);
        let y = self.inside(self.bounds.height);
        self.spawn(x, y, speed_scale)
    }

    fn inside(&mut self, extent: f64) -> f64 {
        let (lo, hi) = (WALL_MARGIN, extent - WALL_MARGIN);
        if lo < hi { self.rng.gen_range(lo..hi) } else { extent / 2.0 }
    }

    pub fn spawn_with_velocity(&mut self, x: f64, y: f64, dx: f64, dy: f64, color: (u8, u8, u8)) -> BallId {
        let id = BallId(self.next_id);
        self.next_id += 1;
        self.balls.push(Ball {
            id,
            x,
            y,
            dx,
            dy,
            color,
            radius: BALL_RADIUS,
        });
        id
    }

    pub fn clear(&mut self) {
        self.balls.clear();
    }

    /// Advance every ball one tick and report wall hits in iteration order.
    ///
    /// A wall only bounces a ball that is heading into it, so a ball that
    /// overshoots the margin flips once and then travels back out instead of
    /// jittering on the wall.
    pub fn step(&mut self) -> Vec<CollisionEvent> {
        let Bounds { width, height } = self.bounds;
        let mut events = Vec::new();
        for ball in self.balls.iter_mut() {
            ball.x += ball.dx;
            ball.y += ball.dy;

            let hit_left = ball.x < WALL_MARGIN && ball.dx < 0.0;
            let hit_right = ball.x > width - WALL_MARGIN && ball.dx > 0.0;
            if hit_left || hit_right {
                ball.dx = -ball.dx;
                events.push(CollisionEvent {
                    ball: ball.id,
                    axis: Axis::Horizontal,
                    x: ball.x,
                    y: ball.y,
                });
            }

            let hit_top = ball.y < WALL_MARGIN && ball.dy < 0.0;
            let hit_bottom = ball.y > height - WALL_MARGIN && ball.dy > 0.0;
            if hit_top || hit_bottom {
                ball.dy = -ball.dy;
                events.push(CollisionEvent {
                    ball: ball.id,
                    axis: Axis::Vertical,
                    x: ball.x,
                    y: ball.y,
                });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> BallSimulator {
        BallSimulator::with_seed(Bounds::default(), 42)
    }

    #[test]
    fn test_spawn_velocity_is_bounded() {
        let mut sim = sim();
        for _ in 0..1000 {
            sim.spawn(500.0, 340.0, 1.0);
        }
        sim.spawn(500.0, 340.0, 40.0); // scale clamps to 1
        for ball in sim.balls() {
            assert!(ball.dx.abs() <= 2.5, "dx {}", ball.dx);
            assert!(ball.dy.abs() <= 2.5, "dy {}", ball.dy);
        }
    }

    #[test]
    fn test_velocity_never_rescaled() {
        let mut sim = sim();
        sim.spawn(500.0, 340.0, 0.5);
        let before = (sim.balls()[0].dx.abs(), sim.balls()[0].dy.abs());
        for _ in 0..10 {
            sim.step();
        }
        let after = (sim.balls()[0].dx.abs(), sim.balls()[0].dy.abs());
        assert_eq!(before, after);
    }

    #[test]
    fn test_right_wall_flips_once_per_crossing() {
        let mut sim = sim();
        sim.spawn_with_velocity(CANVAS_WIDTH - 5.0, 340.0, 2.0, 0.0, (0, 0, 0));

        let events = sim.step();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::Horizontal);
        assert_eq!(sim.balls()[0].dx, -2.0);

        // still inside the margin on the way back out, no second flip
        let events = sim.step();
        assert!(events.is_empty());
        assert_eq!(sim.balls()[0].dx, -2.0);
    }

    #[test]
    fn test_left_wall_and_vertical_walls() {
        let mut sim = sim();
        sim.spawn_with_velocity(11.0, 11.0, -2.0, 0.0, (0, 0, 0));
        sim.spawn_with_velocity(500.0, CANVAS_HEIGHT - 10.5, 0.0, 1.0, (0, 0, 0));
        let events = sim.step();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].axis, Axis::Horizontal);
        assert_eq!(events[1].axis, Axis::Vertical);
        assert_eq!(events[1].ball, sim.balls()[1].id);
    }

    #[test]
    fn test_corner_bounces_both_axes_in_one_tick() {
        let mut sim = sim();
        sim.spawn_with_velocity(CANVAS_WIDTH - 11.0, CANVAS_HEIGHT - 11.0, 2.0, 2.0, (0, 0, 0));
        let events = sim.step();
        assert_eq!(events.len(), 2);
        let ball = &sim.balls()[0];
        assert!(ball.dx < 0.0 && ball.dy < 0.0);
    }

    #[test]
    fn test_clear_then_step_is_silent() {
        let mut sim = sim();
        for _ in 0..5 {
            sim.spawn_with_velocity(CANVAS_WIDTH - 11.0, 340.0, 2.0, 0.0, (0, 0, 0));
        }
        sim.clear();
        assert!(sim.step().is_empty());
        assert!(sim.is_empty());
    }

    #[test]
    fn test_ids_are_unique_across_clear() {
        let mut sim = sim();
        let a = sim.spawn(10.0, 10.0, 1.0);
        sim.clear();
        let b = sim.spawn(10.0, 10.0, 1.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_spawn_lands_inside_margins() {
        let mut sim = sim();
        for _ in 0..200 {
            sim.spawn_random(1.0);
        }
        for ball in sim.balls() {
            assert!(ball.x >= WALL_MARGIN && ball.x <= CANVAS_WIDTH - WALL_MARGIN);
            assert!(ball.y >= WALL_MARGIN && ball.y <= CANVAS_HEIGHT - WALL_MARGIN);
        }
    }

    #[test]
    fn test_random_spawn_in_tiny_arena_uses_centre() {
        let mut sim = BallSimulator::with_seed(Bounds { width: 15.0, height: 2.0 * WALL_MARGIN }, 3);
        sim.spawn_random(1.0);
        let ball = &sim.balls()[0];
        assert_eq!((ball.x, ball.y), (7.5, WALL_MARGIN));
    }
}
