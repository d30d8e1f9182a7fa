pub mod timebase;
