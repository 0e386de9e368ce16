pub mod boundary;
pub mod config;
pub mod playback;
pub mod readout;
pub mod session;
pub mod source;
pub mod track;
