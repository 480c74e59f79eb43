pub mod config;
pub mod dataset;
pub mod display;
pub mod fading;
pub mod image;
pub mod label;
pub mod matcher;
pub mod my_types;
pub mod patch;
pub mod persistence;
pub mod reconciler;
pub mod timebase;
pub mod track;
pub mod tracker;
pub mod trajectory;
