//! # Sample Format Negotiation
//!
//! Decides which decoder output formats the adapter can consume. The first
//! accepted format becomes the baseline for the session: reconnections must
//! keep its channel count and sample rate and may only raise the bit depth.

use bridge_traits::{MediaFormat, SampleEncoding};
use core_wave::SampleKind;
use tracing::debug;

use crate::error::FormatError;

/// The format a session is decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFormat {
    pub channels: u8,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub is_float: bool,
}

/// Outcome of a successful proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedFormat {
    pub format: DecodedFormat,
    pub kind: SampleKind,
}

impl AcceptedFormat {
    pub fn bytes_per_sample(&self) -> usize {
        self.kind.bytes_per_sample()
    }

    pub fn channels(&self) -> usize {
        usize::from(self.format.channels)
    }
}

#[derive(Debug, Default)]
pub struct SampleFormatNegotiator {
    baseline: Option<DecodedFormat>,
    current: Option<AcceptedFormat>,
}

impl SampleFormatNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `candidate` and, if acceptable, make it the current format.
    pub fn propose_format(&mut self, candidate: &MediaFormat) -> Result<AcceptedFormat, FormatError> {
        let accepted = Self::structural_check(candidate)?;

        if let Some(baseline) = &self.baseline {
            if u16::from(baseline.channels) != candidate.channels {
                return Err(FormatError::ChannelMismatch {
                    expected: baseline.channels,
                    actual: candidate.channels,
                });
            }
            if baseline.sample_rate != candidate.sample_rate {
                return Err(FormatError::SampleRateMismatch {
                    expected: baseline.sample_rate,
                    actual: candidate.sample_rate,
                });
            }
            if candidate.bits_per_sample < baseline.bits_per_sample {
                return Err(FormatError::BitDepthDecrease {
                    baseline: baseline.bits_per_sample,
                    actual: candidate.bits_per_sample,
                });
            }
        } else {
            self.baseline = Some(accepted.format);
        }

        debug!(
            channels = accepted.format.channels,
            sample_rate = accepted.format.sample_rate,
            bits = accepted.format.bits_per_sample,
            float = accepted.format.is_float,
            "Accepted decoder format"
        );
        self.current = Some(accepted);
        Ok(accepted)
    }

    pub fn baseline(&self) -> Option<DecodedFormat> {
        self.baseline
    }

    pub fn current(&self) -> Option<AcceptedFormat> {
        self.current
    }

    pub fn reset(&mut self) {
        self.baseline = None;
        self.current = None;
    }

    fn structural_check(candidate: &MediaFormat) -> Result<AcceptedFormat, FormatError> {
        let is_float = match candidate.encoding {
            SampleEncoding::Pcm => false,
            SampleEncoding::IeeeFloat => true,
            SampleEncoding::Other(tag) => {
                return Err(FormatError::UnsupportedEncoding(format!("format tag {tag:#06x}")))
            }
        };

        if !candidate.is_packed() {
            return Err(FormatError::NotPacked {
                bits_per_sample: candidate.bits_per_sample,
                block_align: candidate.block_align,
            });
        }

        let channels = u8::try_from(candidate.channels)
            .map_err(|_| FormatError::TooManyChannels(candidate.channels))?;

        let kind = SampleKind::from_bits(is_float, candidate.bits_per_sample)
            .ok_or(FormatError::UnsupportedBitDepth(candidate.bits_per_sample))?;

        Ok(AcceptedFormat {
            format: DecodedFormat {
                channels,
                sample_rate: candidate.sample_rate,
                bits_per_sample: candidate.bits_per_sample,
                is_float,
            },
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_format_becomes_baseline() {
        let mut negotiator = SampleFormatNegotiator::new();
        let accepted = negotiator.propose_format(&MediaFormat::pcm(2, 44_100, 16)).unwrap();
        assert_eq!(accepted.kind, SampleKind::Pcm16);
        assert_eq!(accepted.bytes_per_sample(), 2);
        assert_eq!(negotiator.baseline().unwrap().sample_rate, 44_100);
    }

    #[test]
    fn test_float_maps_to_four_bytes() {
        let mut negotiator = SampleFormatNegotiator::new();
        let accepted = negotiator.propose_format(&MediaFormat::float(1, 48_000)).unwrap();
        assert_eq!(accepted.kind, SampleKind::Float32);
        assert!(accepted.format.is_float);
        assert_eq!(accepted.bytes_per_sample(), 4);
    }

    #[test]
    fn test_rejects_other_encodings_and_padding() {
        let mut negotiator = SampleFormatNegotiator::new();
        let mut adpcm = MediaFormat::pcm(2, 44_100, 16);
        adpcm.encoding = SampleEncoding::Other(0x0002);
        assert!(matches!(
            negotiator.propose_format(&adpcm),
            Err(FormatError::UnsupportedEncoding(_))
        ));

        // 24 bits carried in 32-bit containers
        let mut padded = MediaFormat::pcm(2, 44_100, 24);
        padded.block_align = 8;
        assert!(matches!(
            negotiator.propose_format(&padded),
            Err(FormatError::NotPacked { .. })
        ));

        assert!(matches!(
            negotiator.propose_format(&MediaFormat::pcm(1, 44_100, 8)),
            Err(FormatError::UnsupportedBitDepth(8))
        ));
        assert!(negotiator.baseline().is_none());
    }

    #[test]
    fn test_rejects_too_many_channels() {
        let mut negotiator = SampleFormatNegotiator::new();
        assert!(matches!(
            negotiator.propose_format(&MediaFormat::pcm(256, 44_100, 16)),
            Err(FormatError::TooManyChannels(256))
        ));
    }

    #[test]
    fn test_reconnect_must_match_baseline() {
        let mut negotiator = SampleFormatNegotiator::new();
        negotiator.propose_format(&MediaFormat::pcm(2, 44_100, 24)).unwrap();

        assert!(matches!(
            negotiator.propose_format(&MediaFormat::pcm(1, 44_100, 24)),
            Err(FormatError::ChannelMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            negotiator.propose_format(&MediaFormat::pcm(2, 48_000, 24)),
            Err(FormatError::SampleRateMismatch { .. })
        ));
        assert!(matches!(
            negotiator.propose_format(&MediaFormat::pcm(2, 44_100, 16)),
            Err(FormatError::BitDepthDecrease { baseline: 24, actual: 16 })
        ));

        let upgraded = negotiator.propose_format(&MediaFormat::float(2, 44_100)).unwrap();
        assert_eq!(negotiator.current(), Some(upgraded));
        // Baseline does not move.
        assert_eq!(negotiator.baseline().unwrap().bits_per_sample, 24);
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut negotiator = SampleFormatNegotiator::new();
        negotiator.propose_format(&MediaFormat::pcm(2, 44_100, 16)).unwrap();
        negotiator.reset();
        assert!(negotiator.baseline().is_none());
        assert!(negotiator.propose_format(&MediaFormat::pcm(1, 22_050, 16)).is_ok());
    }
}
