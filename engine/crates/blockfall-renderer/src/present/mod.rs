pub mod present_flow;
pub mod render_present;
