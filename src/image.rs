//! Owned per-APID raster image, grown in whole-MCU-row increments as
//! packets arrive.

use crate::options::Spacecraft;

/// A multi-channel grayscale raster, one plane per APID in the
/// spacecraft's imagery range.
#[derive(Clone)]
pub struct Image
{
    width:   usize,
    height:  usize,
    planes:  Vec<Vec<u8>>,
    apid_lo: u16
}

impl Image
{
    /// Create an image with `height` rows already allocated (zero-filled)
    /// for every channel in `spacecraft`'s APID range.
    #[must_use]
    pub fn new(spacecraft: Spacecraft, width: usize, height: usize) -> Image
    {
        let (lo, hi) = spacecraft.apid_range();
        let channels = usize::from(hi - lo + 1);

        Image { width, height, planes: vec![vec![0u8; width * height]; channels], apid_lo: lo }
    }

    /// Raster width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize
    {
        self.width
    }

    /// Raster height in pixels (always a multiple of 8 once any MCU row
    /// has been written).
    #[must_use]
    pub const fn height(&self) -> usize
    {
        self.height
    }

    /// Grow every channel plane to `new_height`, zero-filling the newly
    /// added rows. A no-op if `new_height <= height()`.
    pub fn set_height(&mut self, new_height: usize)
    {
        if new_height <= self.height
        {
            return;
        }

        let width = self.width;
        for plane in &mut self.planes
        {
            plane.resize(width * new_height, 0);
        }
        self.height = new_height;
    }

    fn channel_index(&self, apid: u16) -> Option<usize>
    {
        apid.checked_sub(self.apid_lo).map(usize::from).filter(|&c| c < self.planes.len())
    }

    /// Read a pixel at `pos = x + y*width` from `apid`'s plane.
    #[must_use]
    pub fn get_px(&self, apid: u16, pos: usize) -> u8
    {
        self.channel_index(apid).and_then(|c| self.planes[c].get(pos).copied()).unwrap_or(0)
    }

    /// Write a pixel at `pos = x + y*width` into `apid`'s plane. Silently
    /// ignored if `apid` or `pos` is out of range (the caller is expected
    /// to have grown the image first via [`Self::set_height`]).
    pub fn set_px(&mut self, apid: u16, pos: usize, val: u8)
    {
        if let Some(c) = self.channel_index(apid)
        {
            if let Some(slot) = self.planes[c].get_mut(pos)
            {
                *slot = val;
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn new_image_is_zero_filled()
    {
        let img = Image::new(Spacecraft::MeteorM2, 16, 8);
        assert_eq!(img.get_px(64, 0), 0);
        assert_eq!(img.get_px(69, 16 * 7 + 15), 0);
    }

    #[test]
    fn set_height_grows_and_preserves_existing_rows()
    {
        let mut img = Image::new(Spacecraft::MeteorM2, 4, 8);
        img.set_px(65, 0, 200);
        img.set_height(16);

        assert_eq!(img.height(), 16);
        assert_eq!(img.get_px(65, 0), 200);
        assert_eq!(img.get_px(65, 4 * 9), 0);
    }

    #[test]
    fn set_height_shrink_is_noop()
    {
        let mut img = Image::new(Spacecraft::MeteorM2, 4, 16);
        img.set_height(8);
        assert_eq!(img.height(), 16);
    }

    #[test]
    fn out_of_range_apid_reads_zero_and_ignores_writes()
    {
        let mut img = Image::new(Spacecraft::MeteorM2, 4, 8);
        img.set_px(70, 0, 255);
        assert_eq!(img.get_px(70, 0), 0);
    }
}
