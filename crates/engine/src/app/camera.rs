use tracing::trace;

use super::geometry::{bound_num, rect_intersects, Rect, Vec2};

/// Viewport over a scene's pixel space.
///
/// `top_left` always equals `center - view / 2` and is rebuilt on every
/// center change, after which the view is clamped to the scene bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    center: Vec2,
    view_width: f32,
    view_height: f32,
    top_left: Vec2,
    scene_width: f32,
    scene_height: f32,
}

impl Camera {
    /// A camera over a `scene_width` x `scene_height` pixel scene. The view
    /// is empty until [`Camera::setup`] runs.
    pub fn new(scene_width: f32, scene_height: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            view_width: 0.0,
            view_height: 0.0,
            top_left: Vec2::ZERO,
            scene_width,
            scene_height,
        }
    }

    pub fn setup(&mut self, center_x: f32, center_y: f32, view_width: f32, view_height: f32) {
        self.center = Vec2::new(center_x, center_y);
        self.view_width = view_width;
        self.view_height = view_height;
        self.calculate_top_left();
    }

    pub fn center(&mut self, x: f32, y: f32) {
        self.center = Vec2::new(x, y);
        self.calculate_top_left();
        self.clamp_view();
    }

    /// Snaps the view back inside the scene. Scenes smaller than the view on
    /// either axis are left unclamped.
    pub fn clamp_view(&mut self) {
        if self.scene_width < self.view_width || self.scene_height < self.view_height {
            return;
        }

        let half_width = self.view_width * 0.5;
        let half_height = self.view_height * 0.5;
        let corrected = Vec2::new(
            bound_num(self.center.x, half_width, self.scene_width - half_width),
            bound_num(self.center.y, half_height, self.scene_height - half_height),
        );

        if corrected != self.center {
            trace!(
                from_x = self.center.x,
                from_y = self.center.y,
                to_x = corrected.x,
                to_y = corrected.y,
                "camera_clamped"
            );
            // The corrected edge lands exactly on the boundary, so this
            // re-center never needs a second correction.
            self.center = corrected;
            self.calculate_top_left();
        }
    }

    pub fn get_relative(&self, world: Vec2) -> Vec2 {
        Vec2::new(world.x - self.top_left.x, world.y - self.top_left.y)
    }

    /// `rect` is in view-relative coordinates. Uses the single-corner
    /// intersection test from [`rect_intersects`].
    pub fn rect_in_view(&self, rect: &Rect) -> bool {
        let view = Rect::new(Vec2::ZERO, self.view_width, self.view_height);
        rect_intersects(rect, &view)
    }

    /// The view in world coordinates.
    pub fn view_rect(&self) -> Rect {
        Rect::new(self.top_left, self.view_width, self.view_height)
    }

    pub fn center_point(&self) -> Vec2 {
        self.center
    }

    pub fn top_left(&self) -> Vec2 {
        self.top_left
    }

    pub fn view_size(&self) -> (f32, f32) {
        (self.view_width, self.view_height)
    }

    fn calculate_top_left(&mut self) {
        self.top_left = Vec2::new(
            self.center.x - self.view_width * 0.5,
            self.center.y - self.view_height * 0.5,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(scene: (f32, f32), view: (f32, f32)) -> Camera {
        let mut camera = Camera::new(scene.0, scene.1);
        camera.setup(scene.0 * 0.5, scene.1 * 0.5, view.0, view.1);
        camera
    }

    #[test]
    fn setup_computes_top_left_from_center() {
        let mut camera = Camera::new(1000.0, 1000.0);
        camera.setup(200.0, 150.0, 100.0, 50.0);
        assert_eq!(camera.top_left(), Vec2::new(150.0, 125.0));
        assert_eq!(camera.view_size(), (100.0, 50.0));
    }

    #[test]
    fn center_near_origin_clamps_to_zero_offset() {
        let mut camera = camera((320.0, 320.0), (100.0, 100.0));
        camera.center(10.0, 10.0);
        assert_eq!(camera.top_left(), Vec2::new(0.0, 0.0));
        assert_eq!(camera.center_point(), Vec2::new(50.0, 50.0));
    }

    #[test]
    fn center_past_far_edge_clamps_to_boundary() {
        let mut camera = camera((320.0, 240.0), (100.0, 80.0));
        camera.center(400.0, 400.0);
        assert_eq!(camera.top_left(), Vec2::new(220.0, 160.0));
        let view = camera.view_rect();
        assert_eq!(view.bottom_right(), Vec2::new(320.0, 240.0));
    }

    #[test]
    fn center_inside_bounds_is_unchanged() {
        let mut camera = camera((320.0, 320.0), (100.0, 100.0));
        camera.center(160.0, 120.0);
        assert_eq!(camera.center_point(), Vec2::new(160.0, 120.0));
        assert_eq!(camera.top_left(), Vec2::new(110.0, 70.0));
    }

    #[test]
    fn small_scene_skips_clamping() {
        let mut camera = camera((64.0, 320.0), (100.0, 100.0));
        camera.center(10.0, 10.0);
        assert_eq!(camera.center_point(), Vec2::new(10.0, 10.0));
        assert_eq!(camera.top_left(), Vec2::new(-40.0, -40.0));
    }

    #[test]
    fn clamp_view_is_idempotent() {
        let positions = [
            (-500.0, -500.0),
            (10.0, 300.0),
            (319.0, 1.0),
            (160.0, 160.0),
            (1e6, -1e6),
        ];
        for (x, y) in positions {
            let mut camera = camera((320.0, 320.0), (100.0, 60.0));
            camera.center(x, y);
            let once = camera;
            camera.clamp_view();
            assert_eq!(camera, once);
            camera.clamp_view();
            assert_eq!(camera, once);
        }
    }

    #[test]
    fn get_relative_subtracts_top_left() {
        let mut camera = camera((1000.0, 1000.0), (100.0, 100.0));
        camera.center(300.0, 300.0);
        assert_eq!(
            camera.get_relative(Vec2::new(260.0, 400.0)),
            Vec2::new(10.0, 150.0)
        );
        assert_eq!(
            camera.get_relative(Vec2::new(200.0, 200.0)),
            Vec2::new(-50.0, -50.0)
        );
    }

    #[test]
    fn rect_in_view_tests_view_relative_rects() {
        let camera = camera((1000.0, 1000.0), (100.0, 100.0));
        assert!(camera.rect_in_view(&Rect::new(Vec2::new(10.0, 10.0), 5.0, 5.0)));
        assert!(camera.rect_in_view(&Rect::new(Vec2::new(-20.0, -20.0), 32.0, 32.0)));
        assert!(!camera.rect_in_view(&Rect::new(Vec2::new(101.0, 0.0), 5.0, 5.0)));
        assert!(!camera.rect_in_view(&Rect::new(Vec2::new(-40.0, 0.0), 32.0, 32.0)));
    }
}
