mod transport;

pub use transport::create_transport;
