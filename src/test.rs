mod dataset_test;
mod membership_test;
mod optimizer_test;
mod search_test;
mod svd_test;
