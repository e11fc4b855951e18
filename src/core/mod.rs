pub mod looping;
