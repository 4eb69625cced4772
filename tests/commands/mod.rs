mod test_extract;
mod test_profile;
mod test_reply;
