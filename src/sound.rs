/*!
    audible beat collaborator

    storage and decoding of the sound assets live outside this crate, the master only selects an asset by number and triggers it.
*/

use strum::IntoStaticStr;


/// failure of the sound collaborator, the discriminant is added to the sound error code reported to the host
#[derive(IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundError {
    /// storage card could not be initialized
    CardInit = 0,
    /// storage volume could not be mounted
    Volume = 1,
    /// asset file could not be opened
    Open = 2,
    /// asset could not be decoded
    Create = 3,
    /// no asset selected yet
    NotLoaded = 4,
}
impl core::fmt::Display for SoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.into())
    }
}

/// device playing the metronome beat
pub trait Sound {
    /// load the numbered asset, following beats play it
    fn select(&mut self, asset: u8) -> Result<(), SoundError>;
    /// start playing the loaded asset, must return without waiting for the end of the sound
    fn play(&mut self) -> Result<(), SoundError>;
}
impl<S: Sound + ?Sized> Sound for &mut S {
    fn select(&mut self, asset: u8) -> Result<(), SoundError> {(**self).select(asset)}
    fn play(&mut self) -> Result<(), SoundError> {(**self).play()}
}
