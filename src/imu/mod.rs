pub mod preintegration;
pub mod sample;
pub mod window;

pub use preintegration::{PreintegratedState, Preintegrator};
pub use sample::{GRAVITY, ImuBias, ImuSample};
pub use window::ImuWindow;
