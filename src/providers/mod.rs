pub mod qrz;
