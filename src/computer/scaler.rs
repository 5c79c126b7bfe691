use async_trait::async_trait;
use image::imageops::FilterType;
use image::RgbaImage;

use crate::computer::{Computer, MouseButton, Point};
use crate::config::VirtualResolution;
use crate::errors::{ScreenPilotError, ScreenPilotResult};

/// Immutable mapping between the planner's virtual screen and the native
/// display. Computed once at scaler construction.
#[derive(Debug, Clone, Copy)]
pub struct ScaleTransform {
    virtual_width: u32,
    virtual_height: u32,
    native_width: u32,
    native_height: u32,
    scale_x: f64,
    scale_y: f64,
}

impl ScaleTransform {
    pub fn new(resolution: VirtualResolution, native: (u32, u32)) -> ScreenPilotResult<Self> {
        let (native_width, native_height) = native;
        if resolution.width == 0 || resolution.height == 0 {
            return Err(ScreenPilotError::Config(format!(
                "virtual resolution {resolution} has a zero dimension"
            )));
        }
        if native_width == 0 || native_height == 0 {
            return Err(ScreenPilotError::Config(format!(
                "native display reports degenerate dimensions {native_width}x{native_height}"
            )));
        }
        Ok(Self {
            virtual_width: resolution.width,
            virtual_height: resolution.height,
            native_width,
            native_height,
            scale_x: native_width as f64 / resolution.width as f64,
            scale_y: native_height as f64 / resolution.height as f64,
        })
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    /// Virtual → native, rounded then clamped into the native surface. The
    /// planner may overshoot the virtual bounds slightly; overshoot clamps
    /// rather than fails.
    pub fn to_native(&self, p: Point) -> Point {
        Point {
            x: scale_clamped(p.x, self.scale_x, self.native_width),
            y: scale_clamped(p.y, self.scale_y, self.native_height),
        }
    }

    /// Native → virtual; inverse of [`Self::to_native`] up to rounding.
    pub fn to_virtual(&self, p: Point) -> Point {
        Point {
            x: scale_clamped(p.x, 1.0 / self.scale_x, self.virtual_width),
            y: scale_clamped(p.y, 1.0 / self.scale_y, self.virtual_height),
        }
    }

    /// Scale a scroll delta with the same factors as coordinates. Deltas are
    /// directions, not positions, so no clamping.
    pub fn delta_to_native(&self, dx: i32, dy: i32) -> (i32, i32) {
        (
            (dx as f64 * self.scale_x).round() as i32,
            (dy as f64 * self.scale_y).round() as i32,
        )
    }
}

fn scale_clamped(value: i32, factor: f64, limit: u32) -> i32 {
    let scaled = (value as f64 * factor).round() as i64;
    scaled.clamp(0, limit as i64 - 1) as i32
}

/// Presents an underlying [`Computer`] at a fixed virtual resolution: every
/// incoming coordinate is translated to native space, every outgoing
/// screenshot resized to virtual space.
pub struct Scaler<C> {
    inner: C,
    transform: ScaleTransform,
}

impl<C: Computer> Scaler<C> {
    /// Queries the native dimensions once and fixes the transform for the
    /// lifetime of the wrapper.
    pub async fn new(inner: C, resolution: VirtualResolution) -> ScreenPilotResult<Self> {
        let native = inner.dimensions().await?;
        let transform = ScaleTransform::new(resolution, native)?;
        tracing::info!(
            native = %format!("{}x{}", native.0, native.1),
            requested = %resolution,
            scale_x = transform.scale_x(),
            scale_y = transform.scale_y(),
            "coordinate scaler ready"
        );
        Ok(Self { inner, transform })
    }

    pub fn transform(&self) -> &ScaleTransform {
        &self.transform
    }
}

#[async_trait]
impl<C: Computer> Computer for Scaler<C> {
    async fn dimensions(&self) -> ScreenPilotResult<(u32, u32)> {
        Ok((self.transform.virtual_width, self.transform.virtual_height))
    }

    /// Native capture resized to exactly the virtual resolution. Non-uniform
    /// scale is allowed; there is no letterboxing.
    async fn screenshot(&self) -> ScreenPilotResult<RgbaImage> {
        let native = self.inner.screenshot().await?;
        let (width, height) = (self.transform.virtual_width, self.transform.virtual_height);
        if native.dimensions() == (width, height) {
            return Ok(native);
        }
        Ok(image::imageops::resize(&native, width, height, FilterType::Lanczos3))
    }

    async fn mouse_move(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        let p = self.transform.to_native(Point { x, y });
        self.inner.mouse_move(p.x, p.y).await
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> ScreenPilotResult<()> {
        let p = self.transform.to_native(Point { x, y });
        self.inner.click(p.x, p.y, button).await
    }

    async fn double_click(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        let p = self.transform.to_native(Point { x, y });
        self.inner.double_click(p.x, p.y).await
    }

    async fn drag(&self, path: &[Point]) -> ScreenPilotResult<()> {
        let native: Vec<Point> = path.iter().map(|p| self.transform.to_native(*p)).collect();
        self.inner.drag(&native).await
    }

    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenPilotResult<()> {
        let p = self.transform.to_native(Point { x, y });
        let (ndx, ndy) = self.transform.delta_to_native(dx, dy);
        self.inner.scroll(p.x, p.y, ndx, ndy).await
    }

    async fn type_text(&self, text: &str) -> ScreenPilotResult<()> {
        self.inner.type_text(text).await
    }

    async fn key_press(&self, keys: &[String]) -> ScreenPilotResult<()> {
        self.inner.key_press(keys).await
    }

    async fn wait(&self) -> ScreenPilotResult<()> {
        self.inner.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every native-space call it receives.
    struct FakeDisplay {
        width: u32,
        height: u32,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDisplay {
        fn new(width: u32, height: u32) -> Self {
            Self { width, height, calls: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Computer for FakeDisplay {
        async fn dimensions(&self) -> ScreenPilotResult<(u32, u32)> {
            Ok((self.width, self.height))
        }

        async fn screenshot(&self) -> ScreenPilotResult<RgbaImage> {
            Ok(RgbaImage::new(self.width, self.height))
        }

        async fn mouse_move(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
            self.record(format!("move {x},{y}"));
            Ok(())
        }

        async fn click(&self, x: i32, y: i32, _button: MouseButton) -> ScreenPilotResult<()> {
            self.record(format!("click {x},{y}"));
            Ok(())
        }

        async fn double_click(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
            self.record(format!("double_click {x},{y}"));
            Ok(())
        }

        async fn drag(&self, path: &[Point]) -> ScreenPilotResult<()> {
            let rendered: Vec<String> =
                path.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
            self.record(format!("drag {}", rendered.join(" ")));
            Ok(())
        }

        async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenPilotResult<()> {
            self.record(format!("scroll {x},{y} {dx},{dy}"));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> ScreenPilotResult<()> {
            self.record(format!("type {text}"));
            Ok(())
        }

        async fn key_press(&self, keys: &[String]) -> ScreenPilotResult<()> {
            self.record(format!("keys {}", keys.join("+")));
            Ok(())
        }

        async fn wait(&self) -> ScreenPilotResult<()> {
            self.record("wait".into());
            Ok(())
        }
    }

    fn transform(vw: u32, vh: u32, nw: u32, nh: u32) -> ScaleTransform {
        ScaleTransform::new(VirtualResolution { width: vw, height: vh }, (nw, nh)).unwrap()
    }

    #[test]
    fn documented_example_mapping() {
        let t = transform(1024, 768, 1920, 1080);
        assert_eq!(t.scale_x(), 1.875);
        assert_eq!(t.scale_y(), 1.40625);
        assert_eq!(t.to_native(Point { x: 512, y: 384 }), Point { x: 960, y: 540 });
    }

    #[test]
    fn boundary_round_trip_stays_within_one_pixel() {
        let cases = [
            (1024, 768, 1920, 1080),
            (1024, 768, 800, 600),
            (1280, 1024, 3840, 2160),
            (640, 480, 1366, 768),
            (1024, 768, 1024, 768),
        ];
        for (vw, vh, nw, nh) in cases {
            let t = transform(vw, vh, nw, nh);
            let corner = Point { x: vw as i32 - 1, y: vh as i32 - 1 };
            let back = t.to_virtual(t.to_native(corner));
            assert!(
                (back.x - corner.x).abs() <= 1 && (back.y - corner.y).abs() <= 1,
                "round trip {corner:?} -> {back:?} for {vw}x{vh} over {nw}x{nh}"
            );
        }
    }

    #[test]
    fn in_range_virtual_never_leaves_native_bounds() {
        let t = transform(1024, 768, 1366, 768);
        for x in [0, 1, 511, 1022, 1023] {
            for y in [0, 1, 383, 766, 767] {
                let p = t.to_native(Point { x, y });
                assert!(p.x >= 0 && p.x < 1366, "x out of range: {p:?}");
                assert!(p.y >= 0 && p.y < 768, "y out of range: {p:?}");
            }
        }
    }

    #[test]
    fn overshoot_clamps_instead_of_failing() {
        let t = transform(1024, 768, 1920, 1080);
        assert_eq!(
            t.to_native(Point { x: 1029, y: 773 }),
            Point { x: 1919, y: 1079 }
        );
        assert_eq!(t.to_native(Point { x: -4, y: -4 }), Point { x: 0, y: 0 });
    }

    #[test]
    fn degenerate_native_dimensions_are_fatal() {
        let err = ScaleTransform::new(VirtualResolution::default(), (0, 1080));
        assert!(matches!(err, Err(ScreenPilotError::Config(_))));
    }

    #[tokio::test]
    async fn screenshot_is_exactly_virtual_sized() {
        for (nw, nh) in [(1920, 1080), (1111, 777), (500, 500), (1024, 768)] {
            let scaler = Scaler::new(
                FakeDisplay::new(nw, nh),
                VirtualResolution { width: 1024, height: 768 },
            )
            .await
            .unwrap();
            let shot = scaler.screenshot().await.unwrap();
            assert_eq!(shot.dimensions(), (1024, 768), "native {nw}x{nh}");
        }
    }

    #[tokio::test]
    async fn actions_are_forwarded_in_native_space() {
        let scaler = Scaler::new(
            FakeDisplay::new(1920, 1080),
            VirtualResolution { width: 1024, height: 768 },
        )
        .await
        .unwrap();

        scaler.click(512, 384, MouseButton::Left).await.unwrap();
        scaler
            .drag(&[Point { x: 0, y: 0 }, Point { x: 1023, y: 767 }])
            .await
            .unwrap();
        scaler.scroll(512, 384, 0, 100).await.unwrap();
        scaler.type_text("hi").await.unwrap();

        assert_eq!(
            scaler.inner.calls(),
            vec![
                "click 960,540",
                "drag 0,0 1919,1079",
                "scroll 960,540 0,141",
                "type hi",
            ]
        );
    }
}
