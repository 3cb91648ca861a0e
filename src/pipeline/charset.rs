//! Character-set detection for legacy help pages.
//!
//! Detection order:
//! 1. Byte-order mark
//! 2. Strict UTF-8 validation
//! 3. chardetng statistical guess, accepted even when not confident
//!
//! The last step always yields an encoding, so detection never fails; decoding
//! with the result replaces malformed sequences instead of erroring.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

pub trait CharsetDetector: Send + Sync {
    fn detect(&self, raw: &[u8]) -> &'static Encoding;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalDetector;

impl CharsetDetector for StatisticalDetector {
    fn detect(&self, raw: &[u8]) -> &'static Encoding {
        if let Some((encoding, _)) = Encoding::for_bom(raw) {
            return encoding;
        }
        if std::str::from_utf8(raw).is_ok() {
            return UTF_8;
        }

        let mut detector = EncodingDetector::new();
        detector.feed(raw, true);
        detector.guess(None, true)
    }
}

/// Decodes `raw` with the detected encoding; a BOM, if present, wins.
pub fn decode_with<'a>(
    detector: &dyn CharsetDetector,
    raw: &'a [u8],
) -> (Cow<'a, str>, &'static Encoding, bool) {
    let encoding = detector.detect(raw);
    encoding.decode(raw)
}
