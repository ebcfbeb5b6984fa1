//! API middleware. Access logging runs outermost so it sees every
//! response, rejections included.

pub mod audit;
