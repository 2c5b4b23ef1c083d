use tabbycat::attributes::Color;

pub const FONT: &str = "DejaVu Sans";
pub const FONTSIZE: f64 = 10.0; // pt
pub const NODE_MARGIN: f64 = 0.025; // in
pub const GATE_HEIGHT: f64 = 1.0; // in
pub const BOUNDARY_HEIGHT: f64 = 0.5; // in

pub const INIT_COLOR        : Color = Color::Rgb(115, 150, 250); // blue
pub const MEASURE_COLOR     : Color = Color::Rgb(230, 115, 125); // red
pub const ONE_QUBIT_COLOR   : Color = Color::Rgb(250, 205, 115); // yellow
pub const TWO_QUBIT_COLOR   : Color = Color::Rgb(255, 136, 68 ); // orange
pub const INTERMEDIATE_COLOR: Color = Color::Rgb(200, 200, 200); // gray
