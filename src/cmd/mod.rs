pub mod output;
pub mod playlist;
