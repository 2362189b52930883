mod basic;
mod lifecycle;
mod probe;
mod relay;
