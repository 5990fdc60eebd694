// Wire-level framing: an oversized payload is split into frames of at most
// the radio's maximum frame size, each led by a 4-byte header.
//
// Frame layout: [seq:u16 BE][total:u16 BE][payload...]. The last frame may be
// shorter. An empty payload fragments to zero frames.

/// Header bytes per frame: 2-byte sequence number + 2-byte total count.
pub const HEADER_SIZE: usize = 4;

/// Splits `payload` into sequence-numbered frames no larger than
/// `max_frame_size`. Callers guarantee `max_frame_size > HEADER_SIZE` and a
/// payload small enough that the frame count fits the 16-bit header field.
pub fn fragment(payload: &[u8], max_frame_size: usize) -> Vec<Vec<u8>> {
    debug_assert!(max_frame_size > HEADER_SIZE);
    let chunk = max_frame_size - HEADER_SIZE;
    let total = payload.len().div_ceil(chunk);

    let mut frames = Vec::with_capacity(total);
    for (seq, slice) in payload.chunks(chunk).enumerate() {
        let mut frame = Vec::with_capacity(HEADER_SIZE + slice.len());
        frame.extend_from_slice(&(seq as u16).to_be_bytes());
        frame.extend_from_slice(&(total as u16).to_be_bytes());
        frame.extend_from_slice(slice);
        frames.push(frame);
    }
    frames
}

/// `(sequence, total)` from a frame header, or `None` for a runt frame.
pub fn parse_header(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < HEADER_SIZE {
        return None;
    }
    Some((
        u16::from_be_bytes([frame[0], frame[1]]),
        u16::from_be_bytes([frame[2], frame[3]]),
    ))
}

/// Payload slice behind the header.
pub fn payload(frame: &[u8]) -> &[u8] {
    &frame[HEADER_SIZE.min(frame.len())..]
}
