mod message;
mod reply;
