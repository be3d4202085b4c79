pub mod bmtc;
