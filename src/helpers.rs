use numtoa::NumToA;

/// Formats a byte slice as a lossy string for logging
pub(crate) struct LossyStr<'a>(pub &'a [u8]);

impl core::fmt::Debug for LossyStr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LossyStr<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:a}", self.0)
    }
}

/// Scratch space for rendering numbers as ASCII
pub(crate) struct NumBuffer {
    inner: [u8; 20],
}

impl NumBuffer {
    pub fn new() -> Self {
        Self { inner: [0x0; 20] }
    }

    /// Renders the value in base 10
    pub fn decimal(&mut self, value: usize) -> &[u8] {
        value.numtoa(10, &mut self.inner)
    }

    /// Renders the value in uppercase base 16
    pub fn hex(&mut self, value: usize) -> &[u8] {
        value.numtoa(16, &mut self.inner)
    }
}

/// Strips leading and trailing ASCII whitespace
pub(crate) fn trim(bytes: &[u8]) -> &[u8] {
    let is_not_whitespace = |c: &u8| !c.is_ascii_whitespace();

    match bytes.iter().position(is_not_whitespace) {
        Some(first) => {
            let last = bytes.iter().rposition(is_not_whitespace).unwrap_or(first);
            &bytes[first..=last]
        }
        None => &[],
    }
}

/// Parses a trailing run of ASCII digits, e.g. the mux id in `b"\r\n2"`
pub(crate) fn trailing_decimal(bytes: &[u8]) -> Option<usize> {
    let start = bytes.iter().rposition(|c| !c.is_ascii_digit()).map_or(0, |i| i + 1);
    let digits = &bytes[start..];

    if digits.is_empty() || digits.len() > 5 {
        return None;
    }

    Some(digits.iter().fold(0, |value, digit| value * 10 + usize::from(digit - b'0')))
}
