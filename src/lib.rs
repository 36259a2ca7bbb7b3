pub mod compiler;
pub mod demo;

#[cfg(test)]
mod tests;
