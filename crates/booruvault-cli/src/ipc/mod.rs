mod client;

pub use client::IpcClient;
