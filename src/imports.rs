pub mod exante;
