//! Tunables for a [`Decoder`](crate::Decoder).
//!
//! Follows the same builder shape as the reference JPEG decoder's options
//! struct: a `Copy` struct with private fields, `Default`, and chained
//! `#[must_use]` setters that return `Self`.

/// Spacecraft profile. A closed enumeration: the per-spacecraft constants
/// (image width, APID range, MCU realignment offsets) are only known-good
/// for the variants listed here.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Spacecraft
{
    /// Meteor-M N2 and N2-2/N2-3/N2-4 class: 1568 px wide imagery, APIDs
    /// 64..=69.
    MeteorM2
}

impl Spacecraft
{
    /// Image width in pixels for this spacecraft's MSU-MR imagery.
    #[must_use]
    pub const fn image_width(self) -> usize
    {
        match self
        {
            Self::MeteorM2 => 1568
        }
    }

    /// Inclusive APID range carrying imagery for this spacecraft.
    #[must_use]
    pub const fn apid_range(self) -> (u16, u16)
    {
        match self
        {
            Self::MeteorM2 => (64, 69)
        }
    }
}

/// Options controlling a decode run.
#[derive(Copy, Clone)]
pub struct DecoderOptions
{
    spacecraft: Spacecraft,
    /// Treat recoverable per-frame errors (RS failure, resync loss) as hard
    /// failures instead of just clearing `framing_ok` and continuing.
    strict_mode: bool,
    /// Ceiling on channel image height, in pixels, used to guard against a
    /// corrupt/wrapping packet counter driving unbounded reallocation.
    max_image_height: usize
}

impl Default for DecoderOptions
{
    fn default() -> Self
    {
        Self {
            spacecraft: Spacecraft::MeteorM2,
            strict_mode: false,
            max_image_height: 1 << 16
        }
    }
}

impl DecoderOptions
{
    /// Create options with library defaults.
    #[must_use]
    pub fn new() -> DecoderOptions
    {
        Self::default()
    }

    /// Get the spacecraft profile this decoder targets.
    #[must_use]
    pub const fn get_spacecraft(&self) -> Spacecraft
    {
        self.spacecraft
    }

    /// Set the spacecraft profile this decoder targets.
    #[must_use]
    pub const fn set_spacecraft(mut self, spacecraft: Spacecraft) -> DecoderOptions
    {
        self.spacecraft = spacecraft;
        self
    }

    /// Get whether recoverable per-frame errors are escalated to hard
    /// failures.
    #[must_use]
    pub const fn get_strict_mode(&self) -> bool
    {
        self.strict_mode
    }

    /// Set whether recoverable per-frame errors are escalated to hard
    /// failures.
    #[must_use]
    pub const fn set_strict_mode(mut self, choice: bool) -> DecoderOptions
    {
        self.strict_mode = choice;
        self
    }

    /// Get the maximum allowed channel image height, in pixels.
    #[must_use]
    pub const fn get_max_image_height(&self) -> usize
    {
        self.max_image_height
    }

    /// Set the maximum allowed channel image height, in pixels.
    ///
    /// Protects against OOM from a corrupt packet counter driving unbounded
    /// image growth.
    #[must_use]
    pub const fn set_max_image_height(mut self, max_image_height: usize) -> DecoderOptions
    {
        self.max_image_height = max_image_height;
        self
    }
}
