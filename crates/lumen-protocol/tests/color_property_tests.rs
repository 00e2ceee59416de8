//! Property tests for the colour → wire conversion.

use lumen_protocol::{DeviceMessage, Rgba};
use proptest::prelude::*;

fn any_rgba() -> impl Strategy<Value = Rgba> {
    any::<[u8; 4]>().prop_map(Rgba::from)
}

proptest! {
    /// Alpha 0 always serializes to black, whatever the colour channels hold
    #[test]
    fn alpha_zero_is_always_black(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let msg = DeviceMessage::from_buffer(1, &[Rgba::new(r, g, b, 0)]).unwrap();
        prop_assert_eq!(msg.pixel(0), Some([0, 0, 0]));
    }

    /// Non-zero alpha passes RGB through untouched
    #[test]
    fn nonzero_alpha_passes_through(
        r in any::<u8>(),
        g in any::<u8>(),
        b in any::<u8>(),
        a in 1u8..=255,
    ) {
        let msg = DeviceMessage::from_buffer(1, &[Rgba::new(r, g, b, a)]).unwrap();
        prop_assert_eq!(msg.pixel(0), Some([r, g, b]));
    }

    /// Payload length always matches the pixel count and the header
    #[test]
    fn header_matches_payload(
        pixels in prop::collection::vec(any_rgba(), 0..512),
        channel in any::<u8>(),
    ) {
        let msg = DeviceMessage::from_buffer(channel, &pixels).unwrap();
        prop_assert_eq!(msg.channel(), channel);
        prop_assert_eq!(msg.pixel_count(), pixels.len());
        prop_assert_eq!(msg.payload().len(), pixels.len() * 3);
        for (i, color) in pixels.iter().enumerate() {
            prop_assert_eq!(msg.pixel(i), Some(color.to_wire()));
        }
    }
}
