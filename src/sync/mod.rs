pub mod recursive_mutex;

pub use recursive_mutex::RecursiveMutex;
