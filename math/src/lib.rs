mod uint256;

pub use uint256::Uint256;
