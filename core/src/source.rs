//! # Interrupt Sources
//!
//! A source is a named interrupt signal. Peripheral sources travel
//! through the interrupt matrix and can be routed to any usable vector;
//! CPU-internal sources (timers, software interrupts, profiling) are
//! hard-wired and always claim their fixed vector, so the OS's own
//! low-level mechanisms end up on stable numbers.

use lattice_hal::matrix::SOURCE_COUNT;

use crate::error::IntrError;

/// CPU-internal interrupt sources with hard-wired vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalSource {
    /// Core timer 0, the OS tick.
    Timer0,
    /// Core timer 2.
    Timer2,
    /// Software interrupt 0.
    Software0,
    /// Software interrupt 1.
    Software1,
    /// Profiling interrupt.
    Profiling,
}

impl InternalSource {
    /// The vector this source is hard-wired to.
    pub const fn vector(self) -> u8 {
        match self {
            InternalSource::Timer0 => 6,
            InternalSource::Timer2 => 16,
            InternalSource::Software0 => 7,
            InternalSource::Software1 => 29,
            InternalSource::Profiling => 11,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            InternalSource::Timer0 => "timer0",
            InternalSource::Timer2 => "timer2",
            InternalSource::Software0 => "software0",
            InternalSource::Software1 => "software1",
            InternalSource::Profiling => "profiling",
        }
    }
}

/// An interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A peripheral line muxed through the interrupt matrix.
    Peripheral(u8),
    /// A CPU-internal signal, never muxed.
    Internal(InternalSource),
}

impl Source {
    /// Whether this is a CPU-internal source.
    #[inline]
    pub const fn is_internal(self) -> bool {
        matches!(self, Source::Internal(_))
    }

    /// The vector this source insists on, if any.
    #[inline]
    pub const fn forced_vector(self) -> Option<u8> {
        match self {
            Source::Peripheral(_) => None,
            Source::Internal(i) => Some(i.vector()),
        }
    }

    pub(crate) fn validate(self) -> Result<(), IntrError> {
        match self {
            Source::Peripheral(n) if (n as usize) >= SOURCE_COUNT => Err(IntrError::InvalidSource),
            _ => Ok(()),
        }
    }
}

/// Well-known peripheral source lines of the reference chip.
pub mod periph {
    use super::Source;

    /// UART controller 0.
    pub const UART0: Source = Source::Peripheral(0);
    /// UART controller 1.
    pub const UART1: Source = Source::Peripheral(1);
    /// SPI controller 0.
    pub const SPI0: Source = Source::Peripheral(4);
    /// SPI controller 1.
    pub const SPI1: Source = Source::Peripheral(5);
    /// I2C controller 0.
    pub const I2C0: Source = Source::Peripheral(8);
    /// GPIO bank interrupt.
    pub const GPIO: Source = Source::Peripheral(12);
    /// Timer group 0, channel 0.
    pub const TG0_T0: Source = Source::Peripheral(16);
    /// Timer group 0, channel 1.
    pub const TG0_T1: Source = Source::Peripheral(17);
    /// Timer group 1, channel 0.
    pub const TG1_T0: Source = Source::Peripheral(20);
    /// DMA channel 0.
    pub const DMA_CH0: Source = Source::Peripheral(32);
    /// DMA channel 1.
    pub const DMA_CH1: Source = Source::Peripheral(33);
    /// Radio MAC interrupt.
    pub const RADIO_MAC: Source = Source::Peripheral(40);
}

// =============================================================================
// Tests
// =============================================================================
