pub mod songbird_connector;

pub use songbird_connector::SongbirdConnector;
