pub mod adif;
pub mod logbook;
pub mod map;
pub mod scheduled;
