//! CAN framing.
//!
//! CAN has no software framing layer: the hardware arbitration id is the
//! identifier and the data field is the payload. The only codec concern is
//! the classical-CAN 8-byte payload limit, checked both at configuration
//! time (against a codec schema's width) and per write.

use crate::error::{FrameError, Result};

/// Maximum payload of a classical CAN data frame.
pub const CAN_MAX_PAYLOAD: usize = 8;

/// Check that a payload (or a configured fixed layout) fits one CAN frame.
pub fn check_can_payload(size: usize) -> Result<()> {
    if size > CAN_MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: CAN_MAX_PAYLOAD,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bytes_fit() {
        assert!(check_can_payload(0).is_ok());
        assert!(check_can_payload(8).is_ok());
    }

    #[test]
    fn nine_bytes_rejected() {
        let err = check_can_payload(9).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 9, max: 8 }
        ));
    }
}
