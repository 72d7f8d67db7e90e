pub mod hit;
pub mod paint;
pub mod route;

pub use hit::{hit_test, hit_test_connection, hit_test_rect};
pub use paint::{CanvasFrame, PaintStats, paint_canvas, parse_hex_color};
pub use route::{Segment, route, route_in};
