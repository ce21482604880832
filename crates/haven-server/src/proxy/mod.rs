pub mod pipethrough;
