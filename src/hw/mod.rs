//! STM32F303 implementations of the hardware seams.
//!
//! DMA request mapping used by the demos (DMA1):
//!
//! | Channel | Request |
//! | ------- | ------- |
//! | 3 | SPI1 TX, DAC1 CH1 (with `TIM6_DAC1_DMA_RMP`) |
//! | 6 | I2C1 TX |

pub mod dac;
pub mod dma;
pub mod i2c;
pub mod rcc;
pub mod spi;

pub use stm32f3::stm32f303 as pac;
