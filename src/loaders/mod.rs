pub mod collada;
